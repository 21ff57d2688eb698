//! Worker-thread discipline.
//!
//! Each worker module owns one OS thread and one unbounded FIFO. Delivery
//! only enqueues; the thread pops jobs one at a time and stops after the
//! first terminal message.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use phonon_types::{InstanceId, MessageKind, MessageParams};

use super::{HandlerTable, Module, ModuleContext, Subscriber};

type Task<M> = Box<dyn FnOnce(&mut M, &ModuleContext) + Send>;

/// One entry of a worker's queue.
pub(crate) enum Job<M> {
    Message(MessageKind, MessageParams),
    /// Run a callable on the worker, in queue order with messages.
    Execute(Task<M>),
}

/// Sending side of a worker module's queue.
///
/// Cheap to clone; every clone feeds the same FIFO.
pub struct WorkerHandle<M> {
    name: Arc<str>,
    tx: Sender<Job<M>>,
}

impl<M> Clone for WorkerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M: Module> WorkerHandle<M> {
    pub fn module_name(&self) -> &str {
        &self.name
    }

    /// Fire-and-forget: run `f` on the worker thread after everything already
    /// queued for it. Returns false if the worker has already stopped.
    pub fn execute<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut M, &ModuleContext) + Send + 'static,
    {
        self.send(Job::Execute(Box::new(f)))
    }

    fn send(&self, job: Job<M>) -> bool {
        if self.tx.send(job).is_err() {
            log::warn!(target: "worker", "{} has stopped, job dropped", self.name);
            return false;
        }
        true
    }
}

impl<M> std::fmt::Debug for WorkerHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("queued", &self.tx.len())
            .finish()
    }
}

/// The bus-facing half of a worker module.
pub(crate) struct WorkerModule<M: Module> {
    id: InstanceId,
    kinds: Vec<MessageKind>,
    handle: WorkerHandle<M>,
}

impl<M: Module> WorkerModule<M> {
    pub(crate) fn handle(&self) -> WorkerHandle<M> {
        self.handle.clone()
    }
}

impl<M: Module> Subscriber for WorkerModule<M> {
    fn name(&self) -> &str {
        &self.handle.name
    }

    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn kinds(&self) -> &[MessageKind] {
        &self.kinds
    }

    fn deliver(&self, kind: MessageKind, params: &MessageParams) {
        self.handle.send(Job::Message(kind, params.clone()));
    }

    fn terminate(&self, kind: MessageKind) {
        // The thread stops on the first terminal message; a second one finds
        // the queue closed, which is fine.
        let _ = self.handle.tx.send(Job::Message(kind, MessageParams::new()));
    }

    fn configure(&self) {
        self.handle.execute(|module: &mut M, ctx: &ModuleContext| module.configure(ctx));
    }

    fn is_threaded(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Start the dedicated thread for `module`.
pub(crate) fn spawn<M: Module>(
    module: M,
    ctx: ModuleContext,
    id: InstanceId,
    thread_name: String,
) -> io::Result<(Arc<WorkerModule<M>>, JoinHandle<()>)> {
    let table = module.handlers();
    let kinds = table.kinds();
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = WorkerHandle {
        name: Arc::from(ctx.module_name()),
        tx,
    };

    let worker = WorkerThread {
        module,
        table,
        rx,
        ctx,
    };
    let join_handle = thread::Builder::new()
        .name(thread_name)
        .spawn(move || worker.run())?;

    Ok((Arc::new(WorkerModule { id, kinds, handle }), join_handle))
}

struct WorkerThread<M: Module> {
    module: M,
    table: HandlerTable<M>,
    rx: Receiver<Job<M>>,
    ctx: ModuleContext,
}

impl<M: Module> WorkerThread<M> {
    fn run(mut self) {
        log::debug!(target: "worker", "{} started", self.ctx.module_name());

        while let Ok(job) = self.rx.recv() {
            match job {
                Job::Message(kind, params) => {
                    self.table.invoke(&mut self.module, &self.ctx, kind, &params);
                    if kind.is_terminal() {
                        break;
                    }
                }
                Job::Execute(task) => {
                    let module = &mut self.module;
                    let ctx = &self.ctx;
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(module, ctx))) {
                        log::error!(
                            target: "worker",
                            "{} panicked in scheduled call: {}",
                            ctx.module_name(),
                            crate::panic_message(payload.as_ref())
                        );
                    }
                }
            }
        }

        let dropped = self.rx.len();
        if dropped > 0 {
            log::debug!(
                target: "worker",
                "{} stopped with {} job(s) left after its terminal message",
                self.ctx.module_name(),
                dropped
            );
        } else {
            log::debug!(target: "worker", "{} stopped", self.ctx.module_name());
        }
    }
}
