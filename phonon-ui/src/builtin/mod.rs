//! Modules compiled into the player.

mod notify;
mod now_playing;
mod scrobbler;
mod tracklist;

use std::path::PathBuf;

use phonon_core::ModuleRegistration;
use phonon_types::ModuleDescriptor;

use notify::Notify;
use now_playing::NowPlaying;
use scrobbler::Scrobbler;
use tracklist::Tracklist;

/// Every built-in module. `data_dir` is where modules keep their files;
/// `echo` lets UI modules write to stdout.
pub fn registrations(data_dir: Option<PathBuf>, echo: bool) -> Vec<ModuleRegistration> {
    let scrobble_log = data_dir.map(|d| d.join("scrobbles.json"));
    vec![
        ModuleRegistration::ui(
            ModuleDescriptor::new("now_playing", "Now Playing", "Shows the current track").mandatory(),
            move || NowPlaying::new(echo),
        ),
        ModuleRegistration::ui(
            ModuleDescriptor::new("tracklist", "Tracklist", "The play queue").mandatory(),
            Tracklist::default,
        ),
        ModuleRegistration::worker(
            ModuleDescriptor::new("scrobbler", "Scrobbler", "Keeps a log of played tracks").configurable(),
            move || Scrobbler::new(scrobble_log.clone()),
        ),
        ModuleRegistration::worker(
            ModuleDescriptor::new("notify", "Desktop Notifications", "Announces each new track")
                .requires(notify::TOOL),
            Notify::default,
        ),
    ]
}
