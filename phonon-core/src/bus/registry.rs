//! Subscriber registry: message kind → live instances subscribed to it.

use std::collections::BTreeMap;
use std::sync::Arc;

use phonon_types::{InstanceId, MessageKind};

use crate::module::Subscriber;

/// Per-kind subscriber names and instance ids, in delivery order.
pub type RegistrySnapshot = BTreeMap<MessageKind, Vec<(String, InstanceId)>>;

/// Invariant: an instance is listed under `kind` iff `kind` is one of its
/// handler table keys and the instance is registered.
#[derive(Default)]
pub(crate) struct Registry {
    /// Every registered instance, in registration order.
    members: Vec<Arc<dyn Subscriber>>,
    by_kind: BTreeMap<MessageKind, Vec<Arc<dyn Subscriber>>>,
}

impl Registry {
    /// Idempotent: registering an instance twice changes nothing.
    pub(crate) fn register(&mut self, subscriber: Arc<dyn Subscriber>) {
        let id = subscriber.instance_id();
        if self.members.iter().any(|m| m.instance_id() == id) {
            return;
        }
        for &kind in subscriber.kinds() {
            let list = self.by_kind.entry(kind).or_default();
            if !list.iter().any(|s| s.instance_id() == id) {
                list.push(subscriber.clone());
            }
        }
        self.members.push(subscriber);
    }

    /// Remove an instance from every kind. Returns false if it wasn't registered.
    pub(crate) fn unregister(&mut self, id: InstanceId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.instance_id() != id);
        if self.members.len() == before {
            return false;
        }
        self.by_kind.retain(|_, list| {
            list.retain(|s| s.instance_id() != id);
            !list.is_empty()
        });
        true
    }

    pub(crate) fn subscribers_of(&self, kind: MessageKind) -> Vec<Arc<dyn Subscriber>> {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }

    pub(crate) fn find(&self, name: &str) -> Option<Arc<dyn Subscriber>> {
        self.members.iter().find(|m| m.name() == name).cloned()
    }

    pub(crate) fn members(&self) -> Vec<Arc<dyn Subscriber>> {
        self.members.clone()
    }

    pub(crate) fn snapshot(&self) -> RegistrySnapshot {
        self.by_kind
            .iter()
            .map(|(kind, list)| {
                let entries = list
                    .iter()
                    .map(|s| (s.name().to_string(), s.instance_id()))
                    .collect();
                (*kind, entries)
            })
            .collect()
    }
}
