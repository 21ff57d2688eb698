#![allow(dead_code)]
//! Test harness utilities for phonon-core integration tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use phonon_core::probe::StaticProbe;
use phonon_core::store::MemoryStore;
use phonon_core::{Bus, HandlerTable, Module, ModuleContext, ModuleManager};
use phonon_types::{MessageKind, MessageParams};

/// One handler invocation seen by a [`Recorder`].
#[derive(Debug, Clone)]
pub struct Record {
    pub module: String,
    pub kind: MessageKind,
    pub params: MessageParams,
    pub thread: ThreadId,
}

pub type Log = Arc<Mutex<Vec<Record>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Module that appends every message it handles to a shared log.
pub struct Recorder {
    log: Log,
    kinds: Vec<MessageKind>,
    /// Per-kind delay before recording, to simulate slow handlers.
    delays: BTreeMap<MessageKind, Duration>,
}

impl Recorder {
    pub fn new(log: Log, kinds: &[MessageKind]) -> Self {
        Self {
            log,
            kinds: kinds.to_vec(),
            delays: BTreeMap::new(),
        }
    }

    pub fn slow_on(mut self, kind: MessageKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }
}

impl Module for Recorder {
    fn handlers(&self) -> HandlerTable<Self> {
        let mut table = HandlerTable::new();
        for &kind in &self.kinds {
            table = table.on(
                kind,
                move |m: &mut Recorder, ctx: &ModuleContext, params: &MessageParams| {
                    if let Some(delay) = m.delays.get(&kind) {
                        thread::sleep(*delay);
                    }
                    m.log.lock().unwrap().push(Record {
                        module: ctx.module_name().to_string(),
                        kind,
                        params: params.clone(),
                        thread: thread::current().id(),
                    });
                    Ok(())
                },
            );
        }
        table
    }
}

/// Constructor suitable for `ModuleRegistration::ui`/`worker`.
pub fn recorder(log: &Log, kinds: &[MessageKind]) -> impl Fn() -> Recorder + Send + 'static {
    let log = log.clone();
    let kinds = kinds.to_vec();
    move || Recorder::new(log.clone(), &kinds)
}

/// Records of `module` in the order they were handled.
pub fn records_of(log: &Log, module: &str) -> Vec<Record> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|r| r.module == module)
        .cloned()
        .collect()
}

pub fn count(log: &Log, module: &str, kind: MessageKind) -> usize {
    records_of(log, module)
        .iter()
        .filter(|r| r.kind == kind)
        .count()
}

/// Pump the UI loop until `done` holds, or panic after `timeout`.
pub fn pump_until(bus: &Bus, timeout: Duration, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        if start.elapsed() > timeout {
            panic!("condition not reached within {:?}", timeout);
        }
        bus.pump_timeout(Duration::from_millis(2));
    }
}

/// Pump for a while so late deliveries would have shown up.
pub fn settle(bus: &Bus) {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(50) {
        bus.pump_timeout(Duration::from_millis(5));
    }
}

/// Manager on a fresh bus, with the given capabilities available.
pub fn manager(store: MemoryStore, capabilities: &[&str]) -> ModuleManager {
    let probe = StaticProbe::new(capabilities.iter().copied());
    ModuleManager::new(Bus::new(), Box::new(probe), Box::new(store))
}

pub fn track(title: &str) -> MessageParams {
    MessageParams::new().with("title", title)
}

pub fn titles(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.params.get_str("title").unwrap_or_default().to_string())
        .collect()
}
