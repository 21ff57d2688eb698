//! The message bus: who is subscribed to what, and how a posted message
//! reaches each subscriber.
//!
//! A `Bus` is a cheap cloneable handle. The thread that calls [`Bus::new`]
//! becomes the UI thread; all delivery happens there. Other threads post by
//! queueing onto the UI loop (see [`ui_loop`]).

mod registry;
mod ui_loop;

pub use registry::RegistrySnapshot;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender};

use phonon_types::{InstanceId, MessageKind, MessageParams};

use crate::lock;
use crate::module::worker::WorkerModule;
use crate::module::{Module, Subscriber, WorkerHandle};
use registry::Registry;
use ui_loop::UiEvent;

struct BusInner {
    registry: Mutex<Registry>,
    ui_tx: Sender<UiEvent>,
    ui_rx: Receiver<UiEvent>,
    ui_thread: ThreadId,
    /// Nesting depth of deliveries in progress on the UI thread.
    depth: AtomicUsize,
    quit_requested: AtomicBool,
    quitting: AtomicBool,
    closed: AtomicBool,
    next_instance: AtomicU64,
}

/// Handle to the process-wide module bus.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Create a bus whose UI thread is the calling thread.
    pub fn new() -> Self {
        let (ui_tx, ui_rx) = crossbeam_channel::unbounded();
        Self {
            inner: Arc::new(BusInner {
                registry: Mutex::new(Registry::default()),
                ui_tx,
                ui_rx,
                ui_thread: thread::current().id(),
                depth: AtomicUsize::new(0),
                quit_requested: AtomicBool::new(false),
                quitting: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                next_instance: AtomicU64::new(1),
            }),
        }
    }

    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.inner.ui_thread
    }

    /// True once shutdown has started broadcasting `AppQuit`.
    pub fn is_quitting(&self) -> bool {
        self.inner.quitting.load(Ordering::Acquire)
    }

    /// True once shutdown has completed; nothing is delivered any more.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Post a message to every module subscribed to `kind`.
    ///
    /// Callable from any thread. On the UI thread outside of a handler, the
    /// message is delivered before `post` returns, after any UI work queued
    /// earlier; UI-affine subscribers have then already run. Anywhere else
    /// (other threads, or a handler posting re-entrantly) it is queued onto
    /// the UI loop. Worker subscribers are never waited for.
    ///
    /// Lifecycle kinds (`AppQuit`, `ModLoaded`, `ModUnloaded`) belong to the
    /// module manager and are refused here.
    pub fn post(&self, kind: MessageKind, params: MessageParams) {
        if kind.is_lifecycle() {
            log::warn!(target: "bus", "refusing to post lifecycle message {}", kind);
            return;
        }
        if self.is_closed() {
            log::debug!(target: "bus", "{} posted after shutdown, dropped", kind);
            return;
        }
        if self.is_ui_thread() && self.inner.depth.load(Ordering::Acquire) == 0 {
            self.pump();
            self.deliver(kind, &params);
        } else {
            self.send_ui(UiEvent::Post(kind, params));
        }
    }

    /// Route one message to its current subscribers. UI thread only.
    pub(crate) fn deliver(&self, kind: MessageKind, params: &MessageParams) {
        // The registry lock is released before any handler runs.
        let subscribers = lock(&self.inner.registry).subscribers_of(kind);
        if subscribers.is_empty() {
            return;
        }
        log::trace!(target: "bus", "{} -> {} subscriber(s)", kind, subscribers.len());

        let _depth = DepthGuard::enter(&self.inner.depth);
        for subscriber in subscribers {
            subscriber.deliver(kind, params);
        }
    }

    /// Run `f` as if it were a delivery: posts made inside it are queued
    /// instead of delivered inline. Used for module code the manager calls
    /// directly (`ModLoaded`, termination, settings).
    pub(crate) fn in_delivery<R>(&self, f: impl FnOnce() -> R) -> R {
        let _depth = DepthGuard::enter(&self.inner.depth);
        f()
    }

    pub(crate) fn register(&self, subscriber: Arc<dyn Subscriber>) {
        lock(&self.inner.registry).register(subscriber);
    }

    pub(crate) fn unregister(&self, id: InstanceId) -> bool {
        lock(&self.inner.registry).unregister(id)
    }

    pub(crate) fn members(&self) -> Vec<Arc<dyn Subscriber>> {
        lock(&self.inner.registry).members()
    }

    pub(crate) fn next_instance_id(&self) -> InstanceId {
        InstanceId::new(self.inner.next_instance.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn begin_quit(&self) {
        self.inner.quitting.store(true, Ordering::Release);
    }

    pub(crate) fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    /// Names of the modules currently subscribed to `kind`, in delivery order.
    pub fn subscribers(&self, kind: MessageKind) -> Vec<String> {
        lock(&self.inner.registry)
            .subscribers_of(kind)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Consistent copy of the whole registry.
    pub fn snapshot(&self) -> RegistrySnapshot {
        lock(&self.inner.registry).snapshot()
    }

    /// Queue handle of the loaded worker module `name`, if it is one of type `M`.
    pub fn worker_handle<M: Module>(&self, name: &str) -> Option<WorkerHandle<M>> {
        let subscriber = lock(&self.inner.registry).find(name)?;
        subscriber
            .as_any()
            .downcast_ref::<WorkerModule<M>>()
            .map(WorkerModule::handle)
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("ui_thread", &self.inner.ui_thread)
            .field("pending", &self.inner.ui_rx.len())
            .field("quitting", &self.is_quitting())
            .finish()
    }
}

struct DepthGuard<'a>(&'a AtomicUsize);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::AcqRel);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
