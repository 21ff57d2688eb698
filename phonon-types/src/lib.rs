//! # phonon-types
//!
//! Shared type definitions for the Phonon player's module bus.
//! This crate contains the message catalog, message payloads and module
//! descriptors used by phonon-core and by every pluggable module.

mod descriptor;
pub mod message;
mod param;

pub use descriptor::ModuleDescriptor;
pub use message::MessageKind;
pub use param::{MessageParams, ParamValue};

/// Process-unique identifier for one live module instance.
///
/// A module that is unloaded and loaded again keeps its name but gets a new
/// `InstanceId`, so the registry never confuses the two incarnations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
