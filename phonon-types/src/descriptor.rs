use serde::{Deserialize, Serialize};

/// Static metadata about one pluggable module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique key. Used for persistence, so it must never change.
    pub name: String,
    pub localized_name: String,
    pub description: String,
    /// Opaque capability ids checked by the host probe before loading.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Mandatory modules are always loaded and can't be unloaded.
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub configurable: bool,
}

impl ModuleDescriptor {
    pub fn new(name: &str, localized_name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            localized_name: localized_name.to_string(),
            description: description.to_string(),
            required_capabilities: Vec::new(),
            mandatory: false,
            configurable: false,
        }
    }

    pub fn requires(mut self, capability: &str) -> Self {
        if !self.required_capabilities.iter().any(|c| c == capability) {
            self.required_capabilities.push(capability.to_string());
        }
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn configurable(mut self) -> Self {
        self.configurable = true;
        self
    }
}
