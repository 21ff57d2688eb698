//! Error types for module lifecycle, cross-thread calls and persistence.

/// A module could not be loaded because the host lacks capabilities it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub module: String,
    pub missing: Vec<String>,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot load {}: missing {}",
            self.module,
            self.missing.join(", ")
        )
    }
}

impl std::error::Error for LoadError {}

/// A lifecycle request that the module manager refuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Mandatory modules can't be unloaded.
    Mandatory(String),
    AlreadyLoaded(String),
    NotLoaded(String),
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mandatory(name) => write!(f, "{} is mandatory and cannot be unloaded", name),
            Self::AlreadyLoaded(name) => write!(f, "{} is already loaded", name),
            Self::NotLoaded(name) => write!(f, "{} is not loaded", name),
        }
    }
}

impl std::error::Error for PolicyError {}

/// Error type for `ModuleManager` operations.
#[derive(Debug)]
pub enum LifecycleError {
    Load(LoadError),
    Policy(PolicyError),
    UnknownModule(String),
    NotConfigurable(String),
    /// The worker thread for a module could not be spawned.
    Spawn(String, std::io::Error),
    /// Lifecycle calls run module code and must come from the UI thread.
    OffUiThread {
        operation: &'static str,
        module: String,
    },
}

impl From<LoadError> for LifecycleError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<PolicyError> for LifecycleError {
    fn from(e: PolicyError) -> Self {
        Self::Policy(e)
    }
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(e) => write!(f, "{}", e),
            Self::Policy(e) => write!(f, "{}", e),
            Self::UnknownModule(name) => write!(f, "unknown module: {}", name),
            Self::NotConfigurable(name) => write!(f, "{} has no settings", name),
            Self::Spawn(name, e) => write!(f, "failed to start thread for {}: {}", name, e),
            Self::OffUiThread { operation, module } => {
                write!(f, "cannot {} {} off the UI thread", operation, module)
            }
        }
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Load(e) => Some(e),
            Self::Policy(e) => Some(e),
            Self::Spawn(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Failure of a blocking call into the UI loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// The UI loop has shut down and will never run the call.
    Disconnected,
    /// The function panicked on the UI loop.
    Panicked,
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "UI loop is no longer running"),
            Self::Panicked => write!(f, "UI call panicked"),
        }
    }
}

impl std::error::Error for CallError {}

/// Error type for enabled-module persistence.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}
