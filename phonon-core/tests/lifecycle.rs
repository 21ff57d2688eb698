mod common;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{count, new_log, pump_until, records_of, recorder, settle, track};
use phonon_core::bus::RegistrySnapshot;
use phonon_core::store::MemoryStore;
use phonon_core::{
    HandlerTable, LifecycleError, LoadError, Module, ModuleContext, ModuleRegistration,
    PolicyError,
};
use phonon_types::{MessageKind, MessageParams, ModuleDescriptor};

const WAIT: Duration = Duration::from_secs(5);

fn desc(name: &str) -> ModuleDescriptor {
    ModuleDescriptor::new(name, name, "")
}

/// Registry with instance ids stripped, for comparing across re-loads.
fn names_only(snapshot: RegistrySnapshot) -> Vec<(MessageKind, Vec<String>)> {
    snapshot
        .into_iter()
        .map(|(kind, list)| (kind, list.into_iter().map(|(name, _)| name).collect()))
        .collect()
}

#[test]
fn missing_capability_is_a_load_error() {
    let log = new_log();
    let mut manager = common::manager(MemoryStore::new(), &["network"]);
    manager.register(ModuleRegistration::worker(
        desc("im_status").requires("network").requires("dbus"),
        recorder(&log, &[MessageKind::TrackChanged]),
    ));
    let before = manager.bus().snapshot();

    match manager.load("im_status") {
        Err(LifecycleError::Load(LoadError { module, missing })) => {
            assert_eq!(module, "im_status");
            assert_eq!(missing, vec!["dbus".to_string()]);
        }
        other => panic!("expected LoadError, got {:?}", other),
    }

    let info = manager.list_modules();
    assert_eq!(info.len(), 1);
    assert!(!info[0].loaded);
    assert!(!manager.is_loaded("im_status"));
    assert!(manager.enabled_modules().is_empty());
    assert_eq!(manager.bus().snapshot(), before);
}

#[test]
fn unloading_a_mandatory_module_changes_nothing() {
    let log = new_log();
    let store = MemoryStore::new();
    let mut manager = common::manager(store.clone(), &[]);
    let kinds = [MessageKind::TrackChanged, MessageKind::ModUnloaded];
    manager.register(ModuleRegistration::worker(desc("tracklist").mandatory(), recorder(&log, &kinds)));
    manager.register(ModuleRegistration::ui(desc("covers"), recorder(&log, &kinds)));
    manager.load("tracklist").unwrap();
    manager.load("covers").unwrap();
    let before = manager.bus().snapshot();
    let saves = store.save_count();

    assert!(matches!(
        manager.unload("tracklist"),
        Err(LifecycleError::Policy(PolicyError::Mandatory(_)))
    ));

    assert_eq!(manager.bus().snapshot(), before);
    assert!(manager.is_loaded("tracklist"));
    assert_eq!(store.save_count(), saves);
    settle(manager.bus());
    assert_eq!(count(&log, "tracklist", MessageKind::ModUnloaded), 0);

    phonon_core::shutdown(&mut manager, || {});
}

#[test]
fn reload_matches_a_fresh_load() {
    let log = new_log();
    let mut manager = common::manager(MemoryStore::new(), &[]);
    let kinds = [MessageKind::TrackChanged, MessageKind::Stop];
    manager.register(ModuleRegistration::worker(desc("scrobbler"), recorder(&log, &kinds)));
    manager.register(ModuleRegistration::ui(desc("covers"), recorder(&log, &kinds)));
    let bus = manager.bus().clone();

    manager.load("scrobbler").unwrap();
    manager.load("covers").unwrap();
    let fresh = bus.snapshot();

    for _ in 0..3 {
        manager.unload("scrobbler").unwrap();
        manager.unload("covers").unwrap();
        assert!(bus.snapshot().is_empty());
        manager.load("scrobbler").unwrap();
        manager.load("covers").unwrap();
    }
    let reloaded = bus.snapshot();
    assert_ne!(fresh, reloaded, "re-loaded instances get new ids");
    assert_eq!(names_only(fresh), names_only(reloaded));

    log.lock().unwrap().clear();
    bus.post(MessageKind::TrackChanged, track("once"));
    pump_until(&bus, WAIT, || count(&log, "scrobbler", MessageKind::TrackChanged) == 1);
    settle(&bus);
    assert_eq!(count(&log, "scrobbler", MessageKind::TrackChanged), 1);
    assert_eq!(count(&log, "covers", MessageKind::TrackChanged), 1);

    let report = phonon_core::shutdown(&mut manager, || {});
    assert_eq!(report.workers_joined, 4);
}

#[test]
fn mod_loaded_goes_only_to_the_new_instance() {
    let log = new_log();
    let mut manager = common::manager(MemoryStore::new(), &[]);
    manager.register(ModuleRegistration::ui(desc("first"), recorder(&log, &[MessageKind::ModLoaded])));
    manager.register(ModuleRegistration::worker(desc("second"), recorder(&log, &[MessageKind::ModLoaded])));
    manager.register(ModuleRegistration::ui(desc("deaf"), recorder(&log, &[MessageKind::Play])));

    manager.load("first").unwrap();
    assert_eq!(count(&log, "first", MessageKind::ModLoaded), 1);
    manager.load("second").unwrap();
    manager.load("deaf").unwrap();
    pump_until(manager.bus(), WAIT, || count(&log, "second", MessageKind::ModLoaded) == 1);
    settle(manager.bus());

    assert_eq!(count(&log, "first", MessageKind::ModLoaded), 1);
    assert_eq!(count(&log, "second", MessageKind::ModLoaded), 1);
    assert!(records_of(&log, "deaf").is_empty());
    phonon_core::shutdown(&mut manager, || {});
}

#[test]
fn unload_sends_mod_unloaded_and_stops_the_worker() {
    let log = new_log();
    let mut manager = common::manager(MemoryStore::new(), &[]);
    let kinds = [MessageKind::ModUnloaded, MessageKind::TrackChanged];
    manager.register(ModuleRegistration::ui(desc("ui"), recorder(&log, &kinds)));
    manager.register(ModuleRegistration::worker(desc("w"), recorder(&log, &kinds)));
    manager.load("ui").unwrap();
    manager.load("w").unwrap();
    let bus = manager.bus().clone();

    manager.unload("ui").unwrap();
    assert_eq!(count(&log, "ui", MessageKind::ModUnloaded), 1);

    manager.unload("w").unwrap();
    pump_until(&bus, WAIT, || count(&log, "w", MessageKind::ModUnloaded) == 1);

    bus.post(MessageKind::TrackChanged, track("too late"));
    settle(&bus);
    assert_eq!(count(&log, "ui", MessageKind::TrackChanged), 0);
    assert_eq!(count(&log, "w", MessageKind::TrackChanged), 0);
    assert!(bus.subscribers(MessageKind::TrackChanged).is_empty());

    let report = phonon_core::shutdown(&mut manager, || {});
    assert_eq!(report.modules_notified, 0);
    assert_eq!(report.workers_joined, 1);
}

#[test]
fn enabled_set_follows_load_and_unload() {
    let log = new_log();
    let store = MemoryStore::new();
    let mut manager = common::manager(store.clone(), &[]);
    manager.register(ModuleRegistration::ui(desc("tracklist").mandatory(), recorder(&log, &[])));
    manager.register(ModuleRegistration::ui(desc("covers"), recorder(&log, &[])));
    manager.register(ModuleRegistration::worker(desc("scrobbler"), recorder(&log, &[])));

    manager.load("tracklist").unwrap();
    assert_eq!(store.save_count(), 0);
    manager.load("covers").unwrap();
    manager.load("scrobbler").unwrap();
    assert_eq!(
        store.names(),
        BTreeSet::from(["covers".to_string(), "scrobbler".to_string()])
    );

    manager.unload("covers").unwrap();
    assert_eq!(store.names(), BTreeSet::from(["scrobbler".to_string()]));
    assert_eq!(store.save_count(), 3);

    phonon_core::shutdown(&mut manager, || {});
}

#[test]
fn start_restores_enabled_modules_and_announces_startup() {
    let log = new_log();
    let store = MemoryStore::with_names(["scrobbler", "uninstalled"]);
    let mut manager = common::manager(store.clone(), &[]);
    let kinds = [MessageKind::AppStarted];
    manager.register(ModuleRegistration::ui(desc("tracklist").mandatory(), recorder(&log, &kinds)));
    manager.register(ModuleRegistration::worker(desc("scrobbler"), recorder(&log, &kinds)));
    manager.register(ModuleRegistration::ui(desc("covers"), recorder(&log, &kinds)));
    manager.register(ModuleRegistration::ui(
        desc("im_status").requires("dbus"),
        recorder(&log, &kinds),
    ));

    manager.start();

    let loaded: Vec<String> = manager
        .list_modules()
        .into_iter()
        .filter(|m| m.loaded)
        .map(|m| m.descriptor.name)
        .collect();
    assert_eq!(loaded, vec!["tracklist".to_string(), "scrobbler".to_string()]);
    assert_eq!(count(&log, "tracklist", MessageKind::AppStarted), 1);
    pump_until(manager.bus(), WAIT, || count(&log, "scrobbler", MessageKind::AppStarted) == 1);
    assert!(store.names().contains("uninstalled"));

    phonon_core::shutdown(&mut manager, || {});
}

struct Settings {
    configured: Arc<AtomicUsize>,
    threads: crossbeam_channel::Sender<thread::ThreadId>,
}

impl Module for Settings {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
    }

    fn configure(&mut self, _ctx: &ModuleContext) {
        self.configured.fetch_add(1, Ordering::SeqCst);
        let _ = self.threads.send(thread::current().id());
    }
}

#[test]
fn configure_runs_on_the_module_context() {
    let configured = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut manager = common::manager(MemoryStore::new(), &[]);
    for (name, threaded) in [("ui_settings", false), ("worker_settings", true)] {
        let configured = configured.clone();
        let tx = tx.clone();
        let ctor = move || Settings {
            configured: configured.clone(),
            threads: tx.clone(),
        };
        let descriptor = desc(name).configurable();
        manager.register(if threaded {
            ModuleRegistration::worker(descriptor, ctor)
        } else {
            ModuleRegistration::ui(descriptor, ctor)
        });
    }

    assert!(matches!(
        manager.configure("ui_settings"),
        Err(LifecycleError::Policy(PolicyError::NotLoaded(_)))
    ));

    manager.load("ui_settings").unwrap();
    manager.load("worker_settings").unwrap();
    let ui_thread = thread::current().id();

    manager.configure("ui_settings").unwrap();
    assert_eq!(rx.try_recv().unwrap(), ui_thread);

    manager.configure("worker_settings").unwrap();
    assert_ne!(rx.recv_timeout(WAIT).unwrap(), ui_thread);
    assert_eq!(configured.load(Ordering::SeqCst), 2);

    phonon_core::shutdown(&mut manager, || {});
}

struct Cache {
    entries: Vec<String>,
    out: crossbeam_channel::Sender<String>,
}

impl Module for Cache {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new().on(
            MessageKind::TrackChanged,
            |m: &mut Cache, _: &ModuleContext, p: &MessageParams| {
                let title = p.get_str("title").unwrap_or_default().to_string();
                m.entries.push(title.clone());
                m.out.send(title).map_err(|e| e.to_string())
            },
        )
    }
}

#[test]
fn scheduled_work_keeps_its_place_among_messages() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut manager = common::manager(MemoryStore::new(), &[]);
    manager.register(ModuleRegistration::worker(desc("cache"), move || Cache {
        entries: Vec::new(),
        out: tx.clone(),
    }));
    manager.register(ModuleRegistration::ui(desc("covers"), recorder(&new_log(), &[])));
    manager.load("cache").unwrap();
    manager.load("covers").unwrap();
    let bus = manager.bus().clone();

    let handle = manager.worker_handle::<Cache>("cache").unwrap();
    assert_eq!(handle.module_name(), "cache");
    assert!(manager.worker_handle::<Cache>("covers").is_none());
    assert!(manager.worker_handle::<common::Recorder>("cache").is_none());

    bus.post(MessageKind::TrackChanged, track("a"));
    assert!(handle.execute(|m: &mut Cache, _: &ModuleContext| {
        let summary = format!("flush {}", m.entries.len());
        let _ = m.out.send(summary);
    }));
    bus.post(MessageKind::TrackChanged, track("b"));

    let got: Vec<String> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    assert_eq!(got, vec!["a", "flush 1", "b"]);

    manager.unload("cache").unwrap();
    phonon_core::shutdown(&mut manager, || {});
    assert!(!handle.execute(|_: &mut Cache, _: &ModuleContext| {}));
}

#[test]
fn operations_on_unknown_modules() {
    let mut manager = common::manager(MemoryStore::new(), &[]);
    assert!(matches!(manager.load("x"), Err(LifecycleError::UnknownModule(_))));
    assert!(matches!(manager.unload("x"), Err(LifecycleError::UnknownModule(_))));
    assert!(matches!(manager.configure("x"), Err(LifecycleError::UnknownModule(_))));
    assert!(manager.list_modules().is_empty());
}

/// UI module that posts to itself from the code the manager calls directly.
struct Greeter {
    plays: Arc<AtomicUsize>,
}

impl Module for Greeter {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on(MessageKind::ModLoaded, |_: &mut Greeter, ctx: &ModuleContext, _: &MessageParams| {
                ctx.post(MessageKind::Play, MessageParams::new());
                Ok(())
            })
            .on(MessageKind::Play, |m: &mut Greeter, _: &ModuleContext, _: &MessageParams| {
                m.plays.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on(MessageKind::Stopped, |m: &mut Greeter, _: &ModuleContext, _: &MessageParams| {
                m.plays.fetch_add(100, Ordering::SeqCst);
                Ok(())
            })
            .on(MessageKind::ModUnloaded, |_: &mut Greeter, ctx: &ModuleContext, _: &MessageParams| {
                ctx.post(MessageKind::Stopped, MessageParams::new());
                Ok(())
            })
    }

    fn configure(&mut self, ctx: &ModuleContext) {
        ctx.post(MessageKind::Play, MessageParams::new());
    }
}

fn greeter_manager(plays: &Arc<AtomicUsize>, log: &common::Log) -> phonon_core::ModuleManager {
    let mut manager = common::manager(MemoryStore::new(), &[]);
    let plays = plays.clone();
    manager.register(ModuleRegistration::ui(desc("greeter").configurable(), move || Greeter {
        plays: plays.clone(),
    }));
    manager.register(ModuleRegistration::ui(
        desc("listener"),
        recorder(log, &[MessageKind::Play, MessageKind::Stopped]),
    ));
    manager
}

#[test]
fn mod_loaded_handler_can_post_to_its_own_module() {
    let plays = Arc::new(AtomicUsize::new(0));
    let log = new_log();
    let mut manager = greeter_manager(&plays, &log);
    manager.load("listener").unwrap();

    manager.load("greeter").unwrap();
    // Queued behind the handler, not delivered inside it.
    assert_eq!(plays.load(Ordering::SeqCst), 0);
    assert_eq!(count(&log, "listener", MessageKind::Play), 0);

    pump_until(manager.bus(), WAIT, || plays.load(Ordering::SeqCst) == 1);
    assert_eq!(count(&log, "listener", MessageKind::Play), 1);

    phonon_core::shutdown(&mut manager, || {});
}

#[test]
fn configure_can_post_to_its_own_module() {
    let plays = Arc::new(AtomicUsize::new(0));
    let log = new_log();
    let mut manager = greeter_manager(&plays, &log);
    manager.load("greeter").unwrap();
    pump_until(manager.bus(), WAIT, || plays.load(Ordering::SeqCst) == 1);

    manager.configure("greeter").unwrap();
    assert_eq!(plays.load(Ordering::SeqCst), 1);
    pump_until(manager.bus(), WAIT, || plays.load(Ordering::SeqCst) == 2);

    phonon_core::shutdown(&mut manager, || {});
}

#[test]
fn mod_unloaded_handler_posts_after_the_module_is_gone() {
    let plays = Arc::new(AtomicUsize::new(0));
    let log = new_log();
    let mut manager = greeter_manager(&plays, &log);
    manager.load("listener").unwrap();
    manager.load("greeter").unwrap();
    pump_until(manager.bus(), WAIT, || plays.load(Ordering::SeqCst) == 1);

    manager.unload("greeter").unwrap();
    assert_eq!(count(&log, "listener", MessageKind::Stopped), 0);
    pump_until(manager.bus(), WAIT, || count(&log, "listener", MessageKind::Stopped) == 1);
    // The unloaded greeter never sees its own farewell.
    assert_eq!(plays.load(Ordering::SeqCst), 1);

    phonon_core::shutdown(&mut manager, || {});
}

#[test]
fn lifecycle_calls_are_refused_off_the_ui_thread() {
    let plays = Arc::new(AtomicUsize::new(0));
    let log = new_log();
    let mut manager = greeter_manager(&plays, &log);
    manager.load("greeter").unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for result in [
                manager.load("listener"),
                manager.unload("greeter"),
                manager.configure("greeter"),
            ] {
                assert!(
                    matches!(result, Err(LifecycleError::OffUiThread { .. })),
                    "{:?}",
                    result
                );
            }
        });
    });

    assert!(manager.is_loaded("greeter"));
    assert!(!manager.is_loaded("listener"));
    assert_eq!(
        manager.enabled_modules(),
        &BTreeSet::from(["greeter".to_string()])
    );

    phonon_core::shutdown(&mut manager, || {});
}
