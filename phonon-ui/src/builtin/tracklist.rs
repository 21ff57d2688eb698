//! The play queue. Turns transport and volume commands into player events.

use std::path::Path;

use phonon_core::{HandlerResult, HandlerTable, Module, ModuleContext};
use phonon_types::{MessageKind, MessageParams};

#[derive(Default)]
pub struct Tracklist {
    paths: Vec<String>,
    current: Option<usize>,
    paused: bool,
    repeat: bool,
}

/// Display title for a path: the file stem, or the path itself.
pub fn title_of(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.to_string())
}

impl Tracklist {
    fn announce(&self, ctx: &ModuleContext) {
        let Some(index) = self.current else {
            ctx.post(MessageKind::Stopped, MessageParams::new());
            return;
        };
        let path = &self.paths[index];
        ctx.post(
            MessageKind::TrackChanged,
            MessageParams::new()
                .with("title", title_of(path))
                .with("path", path.as_str())
                .with("position", index as i64),
        );
    }

    fn step(&mut self, forward: bool) -> Option<usize> {
        let len = self.paths.len();
        let index = self.current?;
        match (forward, index) {
            (true, i) if i + 1 < len => Some(i + 1),
            (true, _) if self.repeat => Some(0),
            (false, 0) if self.repeat => Some(len - 1),
            (false, 0) => Some(0),
            (false, i) => Some(i - 1),
            _ => None,
        }
    }

    fn advance(&mut self, ctx: &ModuleContext, forward: bool) -> HandlerResult {
        self.current = self.step(forward);
        self.paused = false;
        self.announce(ctx);
        Ok(())
    }

    fn set_paused(&mut self, ctx: &ModuleContext, paused: bool) {
        if self.current.is_none() || self.paused == paused {
            return;
        }
        self.paused = paused;
        let kind = if paused { MessageKind::Paused } else { MessageKind::Unpaused };
        ctx.post(kind, MessageParams::new());
    }
}

impl Module for Tracklist {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on(MessageKind::TracklistAdd, |m: &mut Self, ctx: &ModuleContext, p: &MessageParams| {
                let path = p.get_str("path").ok_or("no path given")?;
                m.paths.push(path.to_string());
                ctx.post(
                    MessageKind::NewTracklist,
                    MessageParams::new().with("count", m.paths.len() as i64),
                );
                Ok(())
            })
            .on(MessageKind::TracklistClear, |m: &mut Self, ctx: &ModuleContext, _: &MessageParams| {
                m.paths.clear();
                m.current = None;
                m.paused = false;
                ctx.post(MessageKind::NewTracklist, MessageParams::new().with("count", 0));
                ctx.post(MessageKind::Stopped, MessageParams::new());
                Ok(())
            })
            .on(MessageKind::Play, |m: &mut Self, ctx: &ModuleContext, p: &MessageParams| {
                if m.paths.is_empty() {
                    return Err("tracklist is empty".to_string());
                }
                let wanted = p.get_int("position").unwrap_or(0).max(0) as usize;
                m.current = Some(wanted.min(m.paths.len() - 1));
                m.paused = false;
                m.announce(ctx);
                Ok(())
            })
            .on(MessageKind::Next, |m: &mut Self, ctx: &ModuleContext, _: &MessageParams| {
                m.advance(ctx, true)
            })
            .on(MessageKind::TrackEndedOk, |m: &mut Self, ctx: &ModuleContext, _: &MessageParams| {
                m.advance(ctx, true)
            })
            .on(MessageKind::Previous, |m: &mut Self, ctx: &ModuleContext, _: &MessageParams| {
                m.advance(ctx, false)
            })
            .on(MessageKind::Stop, |m: &mut Self, ctx: &ModuleContext, _: &MessageParams| {
                m.current = None;
                m.paused = false;
                m.announce(ctx);
                Ok(())
            })
            .on(MessageKind::Pause, |m: &mut Self, ctx: &ModuleContext, _: &MessageParams| {
                m.set_paused(ctx, true);
                Ok(())
            })
            .on(MessageKind::TogglePause, |m: &mut Self, ctx: &ModuleContext, _: &MessageParams| {
                let paused = !m.paused;
                m.set_paused(ctx, paused);
                Ok(())
            })
            .on(MessageKind::SetVolume, |_: &mut Self, ctx: &ModuleContext, p: &MessageParams| {
                let volume = p.get_float("volume").ok_or("volume missing")?.clamp(0.0, 1.0);
                ctx.post(MessageKind::VolumeChanged, MessageParams::new().with("volume", volume));
                Ok(())
            })
            .on(MessageKind::SetRepeat, |m: &mut Self, ctx: &ModuleContext, p: &MessageParams| {
                m.repeat = p.get_bool("enabled").unwrap_or(!m.repeat);
                ctx.post(
                    MessageKind::RepeatChanged,
                    MessageParams::new().with("enabled", m.repeat),
                );
                Ok(())
            })
    }
}
