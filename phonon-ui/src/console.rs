//! Line-oriented stdin control, read on its own thread. Player commands are
//! posted; module management is marshalled onto the UI thread.

use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use phonon_core::{Bus, CallError, ModuleManager};
use phonon_types::{MessageKind, MessageParams, ParamValue};

pub const HELP: &str = "\
commands:
  add <path>           queue a file
  clear                empty the queue
  play [n]             play from queue position n
  pause | toggle | stop | next | prev
  seek <seconds>       jump within the current track
  volume <0-100>
  repeat [on|off]
  search <text>
  post <kind> [key=value ...]
  modules              list modules
  load <name> | unload <name> | configure <name>
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Post(MessageKind, MessageParams),
    Load(String),
    Unload(String),
    Configure(String),
    Modules,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let arg = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("{} needs {}", word, what))
        } else {
            Ok(rest.join(" "))
        }
    };
    let post = |kind: MessageKind| -> Result<Option<Command>, String> {
        Ok(Some(Command::Post(kind, MessageParams::new())))
    };

    match word {
        "add" => Ok(Some(Command::Post(
            MessageKind::TracklistAdd,
            MessageParams::new().with("path", arg("a path")?),
        ))),
        "clear" => post(MessageKind::TracklistClear),
        "play" => {
            let mut params = MessageParams::new();
            if let Some(n) = rest.first() {
                let n: i64 = n.parse().map_err(|_| format!("not a position: {}", n))?;
                params = params.with("position", n);
            }
            Ok(Some(Command::Post(MessageKind::Play, params)))
        }
        "pause" => post(MessageKind::Pause),
        "toggle" => post(MessageKind::TogglePause),
        "stop" => post(MessageKind::Stop),
        "next" => post(MessageKind::Next),
        "prev" | "previous" => post(MessageKind::Previous),
        "seek" => {
            let secs: f64 = arg("seconds")?
                .parse()
                .map_err(|_| "seek needs a number of seconds".to_string())?;
            Ok(Some(Command::Post(MessageKind::Seek, MessageParams::new().with("seconds", secs))))
        }
        "volume" => {
            let percent: f64 = arg("a level")?
                .parse()
                .map_err(|_| "volume needs a number".to_string())?;
            let volume = (percent / 100.0).clamp(0.0, 1.0);
            Ok(Some(Command::Post(MessageKind::SetVolume, MessageParams::new().with("volume", volume))))
        }
        "repeat" => {
            let mut params = MessageParams::new();
            match rest.first().copied() {
                Some("on") => params = params.with("enabled", true),
                Some("off") => params = params.with("enabled", false),
                Some(other) => return Err(format!("repeat takes on or off, not {}", other)),
                None => {}
            }
            Ok(Some(Command::Post(MessageKind::SetRepeat, params)))
        }
        "search" => Ok(Some(Command::Post(
            MessageKind::SearchStart,
            MessageParams::new().with("query", arg("some text")?),
        ))),
        "post" => parse_post(&rest).map(Some),
        "modules" => Ok(Some(Command::Modules)),
        "load" => Ok(Some(Command::Load(arg("a module name")?))),
        "unload" => Ok(Some(Command::Unload(arg("a module name")?))),
        "configure" => Ok(Some(Command::Configure(arg("a module name")?))),
        "help" | "?" => Ok(Some(Command::Help)),
        "quit" | "exit" => Ok(Some(Command::Quit)),
        other => Err(format!("unknown command: {} (try help)", other)),
    }
}

fn parse_post(rest: &[&str]) -> Result<Command, String> {
    let (name, pairs) = rest.split_first().ok_or("post needs a message kind")?;
    let kind = MessageKind::ALL
        .iter()
        .copied()
        .find(|k| k.as_str() == *name)
        .ok_or_else(|| format!("unknown message kind: {}", name))?;
    let mut params = MessageParams::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got {}", pair))?;
        params = params.with(key, parse_value(value));
    }
    Ok(Command::Post(kind, params))
}

fn parse_value(raw: &str) -> ParamValue {
    if let Ok(b) = raw.parse::<bool>() {
        return ParamValue::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return ParamValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return ParamValue::Float(f);
    }
    ParamValue::Str(raw.to_string())
}

/// Run a management command on the UI thread and return what to print.
fn manage(bus: &Bus, manager: &Arc<Mutex<ModuleManager>>, command: Command) -> Result<String, CallError> {
    let manager = manager.clone();
    bus.call_on_ui(move || {
        let mut manager = match manager.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = match &command {
            Command::Load(name) => manager.load(name).map(|_| format!("loaded {}", name)),
            Command::Unload(name) => manager.unload(name).map(|_| format!("unloaded {}", name)),
            Command::Configure(name) => manager.configure(name).map(|_| String::new()),
            Command::Modules => {
                return manager
                    .list_modules()
                    .iter()
                    .map(|m| {
                        format!(
                            "{} {:<12} {}",
                            if m.loaded { "*" } else { " " },
                            m.descriptor.name,
                            m.descriptor.localized_name
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            _ => return String::new(),
        };
        result.unwrap_or_else(|e| e.to_string())
    })
}

/// Start reading commands from stdin. End of input counts as `quit`.
pub fn spawn(bus: Bus, manager: Arc<Mutex<ModuleManager>>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("phonon-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!(target: "console", "stdin: {}", e);
                        break;
                    }
                };
                match parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Post(kind, params))) => bus.post(kind, params),
                    Ok(Some(Command::Help)) => println!("{}", HELP),
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => match manage(&bus, &manager, command) {
                        Ok(out) if out.is_empty() => {}
                        Ok(out) => println!("{}", out),
                        Err(e) => {
                            log::warn!(target: "console", "{}", e);
                            return;
                        }
                    },
                    Err(message) => println!("{}", message),
                }
            }
            bus.request_quit();
        })
}
