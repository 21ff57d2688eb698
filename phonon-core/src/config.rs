use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;
use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    bus: BusConfig,
    #[serde(default)]
    modules: ModulesConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Deserialize, Default)]
struct BusConfig {
    shutdown_poll_ms: Option<u64>,
    thread_prefix: Option<String>,
}

#[derive(Deserialize, Default)]
struct ModulesConfig {
    store_file: Option<String>,
    assume_available: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct LoggingConfig {
    level: Option<String>,
}

pub struct Config {
    bus: BusConfig,
    modules: ModulesConfig,
    logging: LoggingConfig,
}

impl Config {
    /// Embedded defaults, overridden by `<config dir>/phonon/config.toml`
    /// when it exists and parses.
    pub fn load() -> Self {
        let mut config = Self::embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => {
                        if let Err(e) = config.merge_str(&contents) {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    }
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        config
    }

    fn embedded() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            bus: base.bus,
            modules: base.modules,
            logging: base.logging,
        }
    }

    /// Overlay a user config document on top of the current values.
    pub fn merge_str(&mut self, contents: &str) -> Result<(), toml::de::Error> {
        let user: ConfigFile = toml::from_str(contents)?;
        merge_bus(&mut self.bus, user.bus);
        merge_modules(&mut self.modules, user.modules);
        merge_logging(&mut self.logging, user.logging);
        Ok(())
    }

    /// Join-loop pump interval during shutdown (clamped to 1..=1000 ms).
    pub fn shutdown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.bus.shutdown_poll_ms.unwrap_or(10).clamp(1, 1000))
    }

    pub fn thread_prefix(&self) -> String {
        self.bus
            .thread_prefix
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "phonon".to_string())
    }

    pub fn store_file(&self) -> String {
        self.modules
            .store_file
            .clone()
            .unwrap_or_else(|| "modules.json".to_string())
    }

    pub fn assume_available(&self) -> Vec<String> {
        self.modules.assume_available.clone().unwrap_or_default()
    }

    pub fn log_level(&self) -> LevelFilter {
        self.logging
            .level
            .as_deref()
            .and_then(parse_level)
            .unwrap_or(LevelFilter::Warn)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("phonon").join("config.toml"))
}

fn merge_bus(base: &mut BusConfig, user: BusConfig) {
    if user.shutdown_poll_ms.is_some() {
        base.shutdown_poll_ms = user.shutdown_poll_ms;
    }
    if user.thread_prefix.is_some() {
        base.thread_prefix = user.thread_prefix;
    }
}

fn merge_modules(base: &mut ModulesConfig, user: ModulesConfig) {
    if user.store_file.is_some() {
        base.store_file = user.store_file;
    }
    if user.assume_available.is_some() {
        base.assume_available = user.assume_available;
    }
}

fn merge_logging(base: &mut LoggingConfig, user: LoggingConfig) {
    if user.level.is_some() {
        base.level = user.level;
    }
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}
