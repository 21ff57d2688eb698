//! Capability probes: whether an optional runtime dependency a module needs
//! is present on this machine.

use std::collections::BTreeSet;

/// Host-side check for one opaque capability id.
pub trait CapabilityProbe: Send {
    fn is_available(&self, capability: &str) -> bool;
}

impl<F> CapabilityProbe for F
where
    F: Fn(&str) -> bool + Send,
{
    fn is_available(&self, capability: &str) -> bool {
        self(capability)
    }
}

/// A fixed set of capabilities known to be present.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    available: BTreeSet<String>,
}

impl StaticProbe {
    pub fn new<I, S>(available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available: available.into_iter().map(Into::into).collect(),
        }
    }
}

impl CapabilityProbe for StaticProbe {
    fn is_available(&self, capability: &str) -> bool {
        self.available.contains(capability)
    }
}

/// Tries each probe in turn; a capability is available if any of them says so.
pub struct AnyProbe {
    probes: Vec<Box<dyn CapabilityProbe>>,
}

impl AnyProbe {
    pub fn new(probes: Vec<Box<dyn CapabilityProbe>>) -> Self {
        Self { probes }
    }
}

impl CapabilityProbe for AnyProbe {
    fn is_available(&self, capability: &str) -> bool {
        self.probes.iter().any(|p| p.is_available(capability))
    }
}
