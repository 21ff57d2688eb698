//! The handler contract every pluggable module implements.
//!
//! A module declares its subscriptions by returning a [`HandlerTable`] once,
//! when it is constructed. The core then runs it under one of two
//! disciplines: UI-affine (handlers run inline on the UI loop, see [`ui`]) or
//! worker-thread (handlers run on a dedicated thread, see [`worker`]).

pub(crate) mod ui;
pub mod worker;

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use phonon_types::{InstanceId, MessageKind, MessageParams};

use crate::bus::Bus;
use crate::error::CallError;

pub use worker::WorkerHandle;

/// Result of one handler invocation. Errors are logged by the core.
pub type HandlerResult = Result<(), String>;

type Handler<M> = Box<dyn FnMut(&mut M, &ModuleContext, &MessageParams) -> HandlerResult + Send>;

/// A pluggable unit of the player.
pub trait Module: Send + Sized + 'static {
    /// Build the subscription table. Called exactly once per instance.
    fn handlers(&self) -> HandlerTable<Self>;

    /// Show the module's settings. Only called for modules whose descriptor
    /// is marked configurable, on the module's own execution context.
    fn configure(&mut self, _ctx: &ModuleContext) {}
}

/// Mapping from message kind to the handler of one module instance.
///
/// Built once and never changed afterwards: its key set is the instance's
/// subscription set.
pub struct HandlerTable<M> {
    handlers: BTreeMap<MessageKind, Handler<M>>,
}

impl<M> HandlerTable<M> {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Add the handler for `kind`, replacing any earlier one.
    pub fn on<F>(mut self, kind: MessageKind, handler: F) -> Self
    where
        F: FnMut(&mut M, &ModuleContext, &MessageParams) -> HandlerResult + Send + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.handlers.keys().copied().collect()
    }

    pub fn subscribes(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `kind`, catching errors and panics at this
    /// boundary. Returns false when the table has no handler for `kind`.
    pub(crate) fn invoke(
        &mut self,
        module: &mut M,
        ctx: &ModuleContext,
        kind: MessageKind,
        params: &MessageParams,
    ) -> bool {
        let Some(handler) = self.handlers.get_mut(&kind) else {
            return false;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| handler(module, ctx, params))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!(target: "bus", "{} failed handling {}: {}", ctx.module_name(), kind, e);
            }
            Err(payload) => {
                log::error!(
                    target: "bus",
                    "{} panicked handling {}: {}",
                    ctx.module_name(),
                    kind,
                    crate::panic_message(payload.as_ref())
                );
            }
        }
        true
    }
}

impl<M> Default for HandlerTable<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// What a handler gets to talk back to the rest of the player.
#[derive(Clone)]
pub struct ModuleContext {
    name: Arc<str>,
    bus: Bus,
}

impl ModuleContext {
    pub(crate) fn new(name: &str, bus: Bus) -> Self {
        Self {
            name: Arc::from(name),
            bus,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.name
    }

    /// Post a message to every subscriber. See [`Bus::post`].
    pub fn post(&self, kind: MessageKind, params: MessageParams) {
        self.bus.post(kind, params);
    }

    /// Run `f` on the UI loop and wait for its result. See [`Bus::call_on_ui`].
    pub fn call_on_ui<T, F>(&self, f: F) -> Result<T, CallError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.bus.call_on_ui(f)
    }

    pub fn is_ui_thread(&self) -> bool {
        self.bus.is_ui_thread()
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("name", &self.name)
            .finish()
    }
}

/// A live module instance as seen by the bus, whatever its discipline.
pub(crate) trait Subscriber: Send + Sync {
    fn name(&self) -> &str;
    fn instance_id(&self) -> InstanceId;
    /// The instance's handler table keys.
    fn kinds(&self) -> &[MessageKind];
    fn subscribes(&self, kind: MessageKind) -> bool {
        self.kinds().contains(&kind)
    }
    /// Route one message. Must not block.
    fn deliver(&self, kind: MessageKind, params: &MessageParams);
    /// Deliver a terminal message. The instance gets nothing after it.
    fn terminate(&self, kind: MessageKind);
    /// Run the module's `configure` on its own execution context.
    fn configure(&self);
    fn is_threaded(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}
