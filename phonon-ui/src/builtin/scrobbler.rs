//! Keeps a local log of played tracks. Runs on its own thread since it
//! touches the disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use phonon_core::{HandlerResult, HandlerTable, Module, ModuleContext};
use phonon_types::{MessageKind, MessageParams};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scrobble {
    pub title: String,
    pub started_at: u64,
}

pub struct Scrobbler {
    path: Option<PathBuf>,
    playing: Option<Scrobble>,
    pending: Vec<Scrobble>,
}

impl Scrobbler {
    /// Played tracks are appended to the JSON list at `path` on unload
    /// and on quit.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            playing: None,
            pending: Vec::new(),
        }
    }

    /// The track that was playing counts as played once something else
    /// starts or playback stops.
    fn finish_current(&mut self) {
        if let Some(scrobble) = self.playing.take() {
            self.pending.push(scrobble);
        }
    }

    fn flush(&mut self) -> HandlerResult {
        if self.pending.is_empty() {
            return Ok(());
        }
        let Some(path) = &self.path else {
            self.pending.clear();
            return Ok(());
        };
        let mut all = read_log(path).map_err(|e| format!("reading {}: {}", path.display(), e))?;
        all.append(&mut self.pending);
        write_log(path, &all).map_err(|e| format!("writing {}: {}", path.display(), e))?;
        log::info!(target: "modules", "scrobbler saved {} play(s)", all.len());
        Ok(())
    }
}

pub fn read_log(path: &Path) -> io::Result<Vec<Scrobble>> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

fn write_log(path: &Path, scrobbles: &[Scrobble]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(scrobbles)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, json)
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Module for Scrobbler {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on(MessageKind::TrackChanged, |m: &mut Self, _: &ModuleContext, p: &MessageParams| {
                m.finish_current();
                m.playing = Some(Scrobble {
                    title: p.get_str("title").unwrap_or("(untitled)").to_string(),
                    started_at: now(),
                });
                Ok(())
            })
            .on(MessageKind::Stopped, |m: &mut Self, _: &ModuleContext, _: &MessageParams| {
                m.finish_current();
                Ok(())
            })
            .on(MessageKind::ModUnloaded, |m: &mut Self, _: &ModuleContext, _: &MessageParams| {
                m.flush()
            })
            .on(MessageKind::AppQuit, |m: &mut Self, _: &ModuleContext, _: &MessageParams| {
                m.flush()
            })
    }

    fn configure(&mut self, ctx: &ModuleContext) {
        let summary = format!(
            "scrobbler: {} play(s) waiting, log at {}",
            self.pending.len(),
            self.path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        // Console output belongs to the UI thread.
        if let Err(e) = ctx.call_on_ui(move || println!("{}", summary)) {
            log::warn!(target: "modules", "scrobbler settings not shown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonon_core::store::MemoryStore;
    use phonon_core::{Bus, ModuleManager, ModuleRegistration};
    use phonon_core::probe::StaticProbe;
    use phonon_types::ModuleDescriptor;

    #[test]
    fn plays_are_written_on_quit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrobbles.json");
        let log_path = path.clone();

        let mut manager = ModuleManager::new(
            Bus::new(),
            Box::new(StaticProbe::new(Vec::<String>::new())),
            Box::new(MemoryStore::new()),
        );
        manager.register(ModuleRegistration::worker(
            ModuleDescriptor::new("scrobbler", "Scrobbler", ""),
            move || Scrobbler::new(Some(log_path.clone())),
        ));
        manager.load("scrobbler").unwrap();

        let bus = manager.bus().clone();
        bus.post(MessageKind::TrackChanged, MessageParams::new().with("title", "a"));
        bus.post(MessageKind::TrackChanged, MessageParams::new().with("title", "b"));
        bus.post(MessageKind::TrackChanged, MessageParams::new().with("title", "c"));
        bus.post(MessageKind::Stopped, MessageParams::new());
        phonon_core::shutdown(&mut manager, || {});

        let titles: Vec<String> = read_log(&path).unwrap().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn flush_appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scrobbles.json");
        let mut scrobbler = Scrobbler::new(Some(path.clone()));
        scrobbler.pending.push(Scrobble { title: "one".into(), started_at: 1 });
        scrobbler.flush().unwrap();
        scrobbler.pending.push(Scrobble { title: "two".into(), started_at: 2 });
        scrobbler.flush().unwrap();
        assert_eq!(read_log(&path).unwrap().len(), 2);
        assert!(scrobbler.pending.is_empty());
    }

    #[test]
    fn corrupt_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrobbles.json");
        fs::write(&path, "not json").unwrap();
        let mut scrobbler = Scrobbler::new(Some(path));
        scrobbler.pending.push(Scrobble { title: "x".into(), started_at: 0 });
        assert!(scrobbler.flush().is_err());
    }
}
