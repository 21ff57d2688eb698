//! # phonon-core
//!
//! The module bus of the Phonon player. Every feature of the player
//! (playback, tracklist, scrobbling, notifications, ...) is a pluggable
//! module that only talks to the others through typed messages.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use phonon_core::bus::Bus;
//! use phonon_core::manager::{ModuleManager, ModuleRegistration};
//! use phonon_core::store::MemoryStore;
//! use phonon_core::shutdown::shutdown;
//! use phonon_types::{MessageKind, MessageParams};
//!
//! // 1. The thread that creates the bus becomes the UI thread
//! let bus = Bus::new();
//!
//! // 2. Register the statically known modules and load the enabled ones
//! let probe = |_cap: &str| true;
//! let mut manager = ModuleManager::new(bus.clone(), Box::new(probe), Box::new(MemoryStore::new()));
//! manager.register(ModuleRegistration::ui(descriptor, NowPlaying::new));
//! manager.start();
//!
//! // 3. Post from anywhere; UI-affine handlers run on the UI loop,
//! //    worker handlers on their module's own thread
//! bus.post(MessageKind::Play, MessageParams::new());
//!
//! // 4. Run the UI loop until someone calls bus.request_quit()
//! bus.run();
//!
//! // 5. Broadcast AppQuit and wait for every worker thread
//! shutdown(&mut manager, || {});
//! ```
//!
//! ## Module Overview
//!
//! - [`bus`]: `Bus`: subscriber registry, `post`/delivery, the UI loop and
//!   `call_on_ui`
//! - [`module`]: the `Module` trait, `HandlerTable`, `ModuleContext`, and the
//!   UI-affine and worker-thread disciplines (`WorkerHandle`)
//! - [`manager`]: `ModuleManager`: load/unload/list, capability checks,
//!   enabled-set persistence
//! - [`shutdown`]: quit broadcast and worker join
//! - [`store`]: enabled-module persistence backends
//! - [`probe`]: capability probes
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`error`]: error types

pub mod bus;
pub mod config;
pub mod error;
pub mod manager;
pub mod module;
pub mod probe;
pub mod shutdown;
pub mod store;

pub use bus::Bus;
pub use error::{CallError, LifecycleError, LoadError, PolicyError, StoreError};
pub use manager::{ModuleInfo, ModuleManager, ModuleRegistration};
pub use module::{HandlerResult, HandlerTable, Module, ModuleContext, WorkerHandle};
pub use shutdown::{shutdown, ShutdownReport};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock ignoring poison. Handlers never run while one of the core's locks is
/// held except inside `catch_unwind`, so a poisoned lock still holds
/// consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
