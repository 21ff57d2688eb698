//! Application quit: tell every module, then wait for every worker thread.

use std::thread::JoinHandle;
use std::time::Instant;

use phonon_types::MessageKind;

use crate::manager::ModuleManager;

/// What happened during [`shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Instances that received `AppQuit`.
    pub modules_notified: usize,
    /// Worker threads joined, including those of modules unloaded earlier.
    pub workers_joined: usize,
    /// Modules whose worker thread ended in a panic.
    pub worker_panics: Vec<String>,
    /// Whether the enabled-module set was saved.
    pub persisted: bool,
}

/// Quit the application. Call on the UI thread, after [`crate::Bus::run`]
/// has returned.
///
/// Every loaded module receives the terminal `AppQuit` (UI-affine modules
/// inline, worker modules as the last entry of their queue) and is removed
/// from the registry. Then every worker thread is joined. While waiting, the
/// UI loop keeps being pumped so a worker blocked in `call_on_ui` during its
/// own cleanup is still served. Only after all workers are gone is the
/// enabled set saved and `exit` called.
pub fn shutdown<F: FnOnce()>(manager: &mut ModuleManager, exit: F) -> ShutdownReport {
    let bus = manager.bus().clone();
    if !bus.is_ui_thread() {
        log::error!(
            target: "shutdown",
            "shutdown called off the UI thread; workers calling into the UI will stall"
        );
    }
    let started_at = Instant::now();
    bus.begin_quit();

    let loaded = manager.drain_loaded();
    let mut report = ShutdownReport {
        modules_notified: loaded.len(),
        ..ShutdownReport::default()
    };
    log::info!(target: "shutdown", "notifying {} module(s)", loaded.len());
    bus.in_delivery(|| {
        for module in &loaded {
            module.subscriber.terminate(MessageKind::AppQuit);
        }
    });
    for module in &loaded {
        bus.unregister(module.subscriber.instance_id());
    }

    let mut threads: Vec<(String, JoinHandle<()>)> = manager.drain_retired();
    threads.extend(loaded.into_iter().filter_map(|m| {
        let name = m.subscriber.name().to_string();
        m.thread.map(|t| (name, t))
    }));

    let poll = manager.shutdown_poll();
    while threads.iter().any(|(_, t)| !t.is_finished()) {
        bus.pump_timeout(poll);
    }
    // Anything the workers queued on their way out.
    bus.pump();

    for (name, thread) in threads {
        match thread.join() {
            Ok(()) => report.workers_joined += 1,
            Err(_) => {
                log::error!(target: "shutdown", "worker thread of {} panicked", name);
                report.worker_panics.push(name);
            }
        }
    }
    log::info!(
        target: "shutdown",
        "joined {} worker(s) in {:?}",
        report.workers_joined + report.worker_panics.len(),
        started_at.elapsed()
    );

    report.persisted = manager.persist();
    bus.close();
    exit();
    log::info!(target: "shutdown", "quit complete");
    report
}
