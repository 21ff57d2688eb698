mod builtin;
mod console;
mod probe;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::LevelFilter;

use phonon_core::config::Config;
use phonon_core::probe::{AnyProbe, CapabilityProbe, StaticProbe};
use phonon_core::store::JsonFileStore;
use phonon_core::{Bus, ModuleManager};

use probe::PathProbe;

fn init_logging(log_level: LevelFilter) {
    use simplelog::{Config as LogConfig, WriteLogger};

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phonon")
        .join("phonon.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path).or_else(|_| File::create("/tmp/phonon.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("phonon: cannot create log file: {}", e);
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, LogConfig::default(), log_file) {
        eprintln!("phonon: logger already set: {}", e);
        return;
    }

    log::info!("phonon starting (log level: {:?})", log_level);
}

fn main() -> io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    let list_only = args.iter().any(|a| a == "--list-modules");

    let config = Config::load();
    init_logging(if verbose { LevelFilter::Debug } else { config.log_level() });

    let bus = Bus::new();
    let probes: Vec<Box<dyn CapabilityProbe>> = vec![
        Box::new(StaticProbe::new(config.assume_available())),
        Box::new(PathProbe::from_env()),
    ];
    let probe = AnyProbe::new(probes);
    let store = JsonFileStore::in_config_dir(&config.store_file());
    log::debug!(target: "modules", "enabled set stored at {}", store.path().display());

    let mut manager = ModuleManager::new(bus.clone(), Box::new(probe), Box::new(store));
    manager.apply_config(&config);
    let data_dir = dirs::data_dir().map(|d| d.join("phonon"));
    for registration in builtin::registrations(data_dir, !list_only) {
        manager.register(registration);
    }

    if list_only {
        let json = serde_json::to_string_pretty(&manager.list_modules())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        println!("{}", json);
        return Ok(());
    }

    manager.start();
    let manager = Arc::new(Mutex::new(manager));
    console::spawn(bus.clone(), manager.clone())?;
    println!("phonon ready, type help for commands");

    bus.run();

    let mut manager = match manager.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let report = phonon_core::shutdown(&mut manager, || {
        log::info!("exiting");
    });
    if !report.worker_panics.is_empty() {
        eprintln!("phonon: worker panics in {}", report.worker_panics.join(", "));
    }
    Ok(())
}
