//! Module lifecycle: the statically compiled list of known modules, which of
//! them are loaded, and which ones the user enabled.
//!
//! `load`, `unload` and `configure` run module code and are refused off the
//! UI thread; from another thread, go through [`Bus::call_on_ui`].

use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

use phonon_types::{MessageKind, MessageParams, ModuleDescriptor};

use crate::bus::Bus;
use crate::config::Config;
use crate::error::{LifecycleError, LoadError, PolicyError};
use crate::module::ui::UiModule;
use crate::module::{worker, Module, ModuleContext, Subscriber, WorkerHandle};
use crate::probe::CapabilityProbe;
use crate::store::EnabledModuleStore;

pub(crate) struct Started {
    pub(crate) subscriber: Arc<dyn Subscriber>,
    pub(crate) thread: Option<JoinHandle<()>>,
}

type StartFn = Box<dyn Fn(&Bus, &str) -> io::Result<Started> + Send>;

/// A known module: its descriptor and how to start an instance of it.
pub struct ModuleRegistration {
    descriptor: ModuleDescriptor,
    start: StartFn,
}

impl ModuleRegistration {
    /// A module whose handlers run inline on the UI loop.
    pub fn ui<M, F>(descriptor: ModuleDescriptor, ctor: F) -> Self
    where
        M: Module,
        F: Fn() -> M + Send + 'static,
    {
        let name = descriptor.name.clone();
        Self {
            descriptor,
            start: Box::new(move |bus, _thread_prefix| {
                let ctx = ModuleContext::new(&name, bus.clone());
                let module = UiModule::new(ctor(), ctx, bus.next_instance_id());
                Ok(Started {
                    subscriber: Arc::new(module),
                    thread: None,
                })
            }),
        }
    }

    /// A module that gets its own thread and queue.
    pub fn worker<M, F>(descriptor: ModuleDescriptor, ctor: F) -> Self
    where
        M: Module,
        F: Fn() -> M + Send + 'static,
    {
        let name = descriptor.name.clone();
        Self {
            descriptor,
            start: Box::new(move |bus, thread_prefix| {
                let ctx = ModuleContext::new(&name, bus.clone());
                let thread_name = format!("{}-{}", thread_prefix, name);
                let (module, thread) =
                    worker::spawn(ctor(), ctx, bus.next_instance_id(), thread_name)?;
                Ok(Started {
                    subscriber: module,
                    thread: Some(thread),
                })
            }),
        }
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }
}

impl std::fmt::Debug for ModuleRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistration")
            .field("name", &self.descriptor.name)
            .finish()
    }
}

/// A descriptor plus its current load state, for settings surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    #[serde(flatten)]
    pub descriptor: ModuleDescriptor,
    pub loaded: bool,
}

pub(crate) struct LoadedModule {
    pub(crate) subscriber: Arc<dyn Subscriber>,
    pub(crate) thread: Option<JoinHandle<()>>,
}

pub struct ModuleManager {
    bus: Bus,
    registrations: Vec<ModuleRegistration>,
    /// Live instances, in load order.
    loaded: Vec<LoadedModule>,
    /// Threads of unloaded worker modules that may still be finishing.
    retired: Vec<(String, JoinHandle<()>)>,
    enabled: BTreeSet<String>,
    probe: Box<dyn CapabilityProbe>,
    store: Box<dyn EnabledModuleStore>,
    thread_prefix: String,
    shutdown_poll: Duration,
}

impl ModuleManager {
    /// Reads the persisted enabled set right away; a store that can't be
    /// read yields an empty set.
    pub fn new(
        bus: Bus,
        probe: Box<dyn CapabilityProbe>,
        store: Box<dyn EnabledModuleStore>,
    ) -> Self {
        let enabled = match store.load_enabled() {
            Ok(names) => names,
            Err(e) => {
                log::warn!(target: "modules", "could not read enabled modules: {}", e);
                BTreeSet::new()
            }
        };
        Self {
            bus,
            registrations: Vec::new(),
            loaded: Vec::new(),
            retired: Vec::new(),
            enabled,
            probe,
            store,
            thread_prefix: "phonon".to_string(),
            shutdown_poll: Duration::from_millis(10),
        }
    }

    pub fn apply_config(&mut self, config: &Config) {
        self.thread_prefix = config.thread_prefix();
        self.shutdown_poll = config.shutdown_poll_interval();
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Add a module to the list of known modules. Names are unique; a second
    /// registration under a known name is ignored.
    pub fn register(&mut self, registration: ModuleRegistration) {
        let name = &registration.descriptor.name;
        if self.registration(name).is_some() {
            log::warn!(target: "modules", "module {} registered twice, ignoring", name);
            return;
        }
        self.registrations.push(registration);
    }

    /// Load every mandatory module and every module the user enabled, then
    /// post `AppStarted`.
    pub fn start(&mut self) {
        let stale: Vec<&String> = self
            .enabled
            .iter()
            .filter(|name| self.registration(name).is_none())
            .collect();
        for name in stale {
            log::warn!(target: "modules", "enabled module {} is not available", name);
        }

        let wanted: Vec<String> = self
            .registrations
            .iter()
            .filter(|r| r.descriptor.mandatory || self.enabled.contains(&r.descriptor.name))
            .map(|r| r.descriptor.name.clone())
            .collect();
        for name in wanted {
            if let Err(e) = self.load_inner(&name, false) {
                log::warn!(target: "modules", "{}", e);
            }
        }

        self.bus.post(MessageKind::AppStarted, MessageParams::new());
    }

    pub fn load(&mut self, name: &str) -> Result<(), LifecycleError> {
        self.load_inner(name, true)
    }

    fn load_inner(&mut self, name: &str, persist: bool) -> Result<(), LifecycleError> {
        self.on_ui_thread("load", name)?;
        let registration = self
            .registration(name)
            .ok_or_else(|| LifecycleError::UnknownModule(name.to_string()))?;
        if self.is_loaded(name) {
            return Err(PolicyError::AlreadyLoaded(name.to_string()).into());
        }

        let missing: Vec<String> = registration
            .descriptor
            .required_capabilities
            .iter()
            .filter(|cap| !self.probe.is_available(cap))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(LoadError {
                module: name.to_string(),
                missing,
            }
            .into());
        }

        let mandatory = registration.descriptor.mandatory;
        let started = (registration.start)(&self.bus, &self.thread_prefix)
            .map_err(|e| LifecycleError::Spawn(name.to_string(), e))?;

        let subscriber = started.subscriber;
        self.bus.register(subscriber.clone());
        if subscriber.subscribes(MessageKind::ModLoaded) {
            self.bus
                .in_delivery(|| subscriber.deliver(MessageKind::ModLoaded, &MessageParams::new()));
        }
        log::info!(
            target: "modules",
            "loaded {} ({})",
            name,
            if subscriber.is_threaded() { "worker" } else { "ui" }
        );
        self.loaded.push(LoadedModule {
            subscriber,
            thread: started.thread,
        });

        if !mandatory && self.enabled.insert(name.to_string()) && persist {
            self.persist();
        }
        Ok(())
    }

    /// Unload `name`. Its worker thread, if any, is not waited for here;
    /// shutdown joins it.
    pub fn unload(&mut self, name: &str) -> Result<(), LifecycleError> {
        self.on_ui_thread("unload", name)?;
        let registration = self
            .registration(name)
            .ok_or_else(|| LifecycleError::UnknownModule(name.to_string()))?;
        if registration.descriptor.mandatory {
            return Err(PolicyError::Mandatory(name.to_string()).into());
        }
        let index = self
            .loaded
            .iter()
            .position(|m| m.subscriber.name() == name)
            .ok_or_else(|| PolicyError::NotLoaded(name.to_string()))?;

        let module = self.loaded.remove(index);
        self.bus
            .in_delivery(|| module.subscriber.terminate(MessageKind::ModUnloaded));
        self.bus.unregister(module.subscriber.instance_id());
        if let Some(thread) = module.thread {
            self.retired.push((name.to_string(), thread));
        }
        log::info!(target: "modules", "unloaded {}", name);

        if self.enabled.remove(name) {
            self.persist();
        }
        Ok(())
    }

    /// Run the settings entry point of a loaded, configurable module.
    pub fn configure(&mut self, name: &str) -> Result<(), LifecycleError> {
        self.on_ui_thread("configure", name)?;
        let registration = self
            .registration(name)
            .ok_or_else(|| LifecycleError::UnknownModule(name.to_string()))?;
        if !registration.descriptor.configurable {
            return Err(LifecycleError::NotConfigurable(name.to_string()));
        }
        let module = self
            .loaded
            .iter()
            .find(|m| m.subscriber.name() == name)
            .ok_or_else(|| PolicyError::NotLoaded(name.to_string()))?;
        self.bus.in_delivery(|| module.subscriber.configure());
        Ok(())
    }

    pub fn list_modules(&self) -> Vec<ModuleInfo> {
        self.registrations
            .iter()
            .map(|r| ModuleInfo {
                descriptor: r.descriptor.clone(),
                loaded: self.is_loaded(&r.descriptor.name),
            })
            .collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|m| m.subscriber.name() == name)
    }

    /// Names the user enabled. Mandatory modules are never listed.
    pub fn enabled_modules(&self) -> &BTreeSet<String> {
        &self.enabled
    }

    /// Queue handle of a loaded worker module of type `M`.
    pub fn worker_handle<M: Module>(&self, name: &str) -> Option<WorkerHandle<M>> {
        self.bus.worker_handle(name)
    }

    fn on_ui_thread(&self, operation: &'static str, name: &str) -> Result<(), LifecycleError> {
        if self.bus.is_ui_thread() {
            return Ok(());
        }
        log::warn!(target: "modules", "{} {} refused off the UI thread", operation, name);
        Err(LifecycleError::OffUiThread {
            operation,
            module: name.to_string(),
        })
    }

    fn registration(&self, name: &str) -> Option<&ModuleRegistration> {
        self.registrations.iter().find(|r| r.descriptor.name == name)
    }

    /// Persist the enabled set, logging failures. Returns whether it worked.
    pub(crate) fn persist(&self) -> bool {
        match self.store.save_enabled(&self.enabled) {
            Ok(()) => true,
            Err(e) => {
                log::error!(target: "modules", "could not save enabled modules: {}", e);
                false
            }
        }
    }

    pub(crate) fn drain_loaded(&mut self) -> Vec<LoadedModule> {
        std::mem::take(&mut self.loaded)
    }

    pub(crate) fn drain_retired(&mut self) -> Vec<(String, JoinHandle<()>)> {
        std::mem::take(&mut self.retired)
    }

    pub(crate) fn shutdown_poll(&self) -> Duration {
        self.shutdown_poll
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded: Vec<&str> = self.loaded.iter().map(|m| m.subscriber.name()).collect();
        f.debug_struct("ModuleManager")
            .field("registered", &self.registrations.len())
            .field("loaded", &loaded)
            .field("enabled", &self.enabled)
            .finish()
    }
}
