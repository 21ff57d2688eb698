//! Desktop notification on track change, through the `notify-send` tool.

use std::process::Command;

use phonon_core::{HandlerTable, Module, ModuleContext};
use phonon_types::{MessageKind, MessageParams};

pub const TOOL: &str = "notify-send";

pub struct Notify {
    program: String,
}

impl Default for Notify {
    fn default() -> Self {
        Self {
            program: TOOL.to_string(),
        }
    }
}

pub fn body(params: &MessageParams) -> String {
    let title = params.get_str("title").unwrap_or("(untitled)");
    match params.get_int("position") {
        Some(position) => format!("{} (#{})", title, position + 1),
        None => title.to_string(),
    }
}

impl Module for Notify {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new().on(
            MessageKind::TrackChanged,
            |m: &mut Self, _: &ModuleContext, p: &MessageParams| {
                let status = Command::new(&m.program)
                    .arg("Now playing")
                    .arg(body(p))
                    .status()
                    .map_err(|e| format!("{}: {}", m.program, e))?;
                if !status.success() {
                    return Err(format!("{} exited with {}", m.program, status));
                }
                Ok(())
            },
        )
    }
}
