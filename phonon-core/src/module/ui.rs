//! UI-affine discipline: handlers run inline on the UI loop.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use phonon_types::{InstanceId, MessageKind, MessageParams};

use super::{HandlerTable, Module, ModuleContext, Subscriber};
use crate::lock;

struct UiState<M> {
    module: M,
    table: HandlerTable<M>,
}

/// A module whose handlers execute synchronously during delivery.
///
/// Only the UI loop delivers to it, so the mutex is never contended; it is
/// there so the instance can sit in the shared registry.
pub(crate) struct UiModule<M: Module> {
    ctx: ModuleContext,
    id: InstanceId,
    kinds: Vec<MessageKind>,
    active: AtomicBool,
    state: Mutex<UiState<M>>,
}

impl<M: Module> UiModule<M> {
    pub(crate) fn new(module: M, ctx: ModuleContext, id: InstanceId) -> Self {
        let table = module.handlers();
        Self {
            kinds: table.kinds(),
            ctx,
            id,
            active: AtomicBool::new(true),
            state: Mutex::new(UiState { module, table }),
        }
    }

    fn invoke(&self, kind: MessageKind, params: &MessageParams) {
        if !self.ctx.is_ui_thread() {
            log::warn!(
                target: "bus",
                "{} ({}) handled off the UI thread",
                self.ctx.module_name(),
                kind
            );
        }
        let mut state = lock(&self.state);
        let UiState { module, table } = &mut *state;
        table.invoke(module, &self.ctx, kind, params);
    }
}

impl<M: Module> Subscriber for UiModule<M> {
    fn name(&self) -> &str {
        self.ctx.module_name()
    }

    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn kinds(&self) -> &[MessageKind] {
        &self.kinds
    }

    fn deliver(&self, kind: MessageKind, params: &MessageParams) {
        // A delivery snapshot may still hold an instance that was unloaded
        // by an earlier subscriber's handler.
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        self.invoke(kind, params);
    }

    fn terminate(&self, kind: MessageKind) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.invoke(kind, &MessageParams::new());
        }
    }

    fn configure(&self) {
        let mut state = lock(&self.state);
        let ctx = &self.ctx;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| state.module.configure(ctx))) {
            log::error!(
                target: "bus",
                "{} panicked in configure: {}",
                ctx.module_name(),
                crate::panic_message(payload.as_ref())
            );
        }
    }

    fn is_threaded(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
