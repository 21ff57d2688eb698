//! Status line for the current track. Stands in for the player window.

use phonon_core::{HandlerTable, Module, ModuleContext};
use phonon_types::{MessageKind, MessageParams};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Status {
    pub title: Option<String>,
    pub paused: bool,
    pub volume: Option<f64>,
}

impl Status {
    pub fn line(&self) -> String {
        let state = match (&self.title, self.paused) {
            (None, _) => return "stopped".to_string(),
            (Some(_), true) => "paused",
            (Some(_), false) => "playing",
        };
        let mut line = format!("{}: {}", state, self.title.as_deref().unwrap_or_default());
        if let Some(volume) = self.volume {
            line.push_str(&format!(" [vol {:.0}%]", volume * 100.0));
        }
        line
    }
}

pub struct NowPlaying {
    status: Status,
    echo: bool,
}

impl NowPlaying {
    pub fn new(echo: bool) -> Self {
        Self {
            status: Status::default(),
            echo,
        }
    }

    fn show(&self) {
        if self.echo {
            println!("{}", self.status.line());
        }
    }
}

impl Module for NowPlaying {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on(MessageKind::TrackChanged, |m: &mut Self, _: &ModuleContext, p: &MessageParams| {
                m.status.title = Some(p.get_str("title").unwrap_or("(untitled)").to_string());
                m.status.paused = false;
                m.show();
                Ok(())
            })
            .on(MessageKind::Paused, |m: &mut Self, _: &ModuleContext, _: &MessageParams| {
                m.status.paused = true;
                m.show();
                Ok(())
            })
            .on(MessageKind::Unpaused, |m: &mut Self, _: &ModuleContext, _: &MessageParams| {
                m.status.paused = false;
                m.show();
                Ok(())
            })
            .on(MessageKind::Stopped, |m: &mut Self, _: &ModuleContext, _: &MessageParams| {
                m.status = Status {
                    volume: m.status.volume,
                    ..Status::default()
                };
                m.show();
                Ok(())
            })
            .on(MessageKind::VolumeChanged, |m: &mut Self, _: &ModuleContext, p: &MessageParams| {
                let volume = p.get_float("volume").ok_or("volume missing")?;
                m.status.volume = Some(volume);
                m.show();
                Ok(())
            })
            .on(MessageKind::AppQuit, |m: &mut Self, _: &ModuleContext, _: &MessageParams| {
                if m.echo {
                    println!("bye");
                }
                Ok(())
            })
    }
}
