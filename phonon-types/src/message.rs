//! The closed catalog of messages exchanged between modules.
//!
//! Commands ask some module to do something; events report that something
//! happened. The bus treats both the same way.

use serde::{Deserialize, Serialize};

/// Every message kind a module can subscribe to or post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    // --- Application / lifecycle events ---
    /// All modules enabled at startup have been loaded.
    AppStarted,
    /// The application is quitting. Terminal: worker threads exit after it.
    AppQuit,
    /// Sent to a module right after it has been loaded.
    ModLoaded,
    /// Sent to a module when it is being unloaded. Terminal.
    ModUnloaded,

    // --- Playback events ---
    /// params: `title`, `path`, `position` (index in the tracklist)
    TrackChanged,
    Paused,
    Unpaused,
    Stopped,
    /// params: `seconds`
    TrackPosition,
    TrackEndedOk,
    /// params: `message`
    TrackEndedError,
    /// params: `volume` (0.0..=1.0)
    VolumeChanged,

    // --- Tracklist events ---
    /// params: `count` (tracks now queued)
    NewTracklist,
    /// params: `from`, `to`
    TrackMoved,
    /// params: `enabled`
    RepeatChanged,

    // --- Library / cover events ---
    /// params: `path`, `cover`
    CoverAvailable,
    /// params: `query`, `paths`
    SearchResult,

    // --- Playback commands ---
    /// params: `position` (optional, defaults to 0)
    Play,
    Pause,
    TogglePause,
    Stop,
    Next,
    Previous,
    /// params: `seconds`
    Seek,
    /// params: `volume` (0.0..=1.0)
    SetVolume,

    // --- Tracklist commands ---
    /// params: `path`
    TracklistAdd,
    TracklistClear,
    /// params: `enabled`
    SetRepeat,

    // --- Library commands ---
    /// params: `query`
    SearchStart,
}

impl MessageKind {
    /// Every kind in the catalog, in declaration order.
    pub const ALL: [MessageKind; 29] = [
        MessageKind::AppStarted,
        MessageKind::AppQuit,
        MessageKind::ModLoaded,
        MessageKind::ModUnloaded,
        MessageKind::TrackChanged,
        MessageKind::Paused,
        MessageKind::Unpaused,
        MessageKind::Stopped,
        MessageKind::TrackPosition,
        MessageKind::TrackEndedOk,
        MessageKind::TrackEndedError,
        MessageKind::VolumeChanged,
        MessageKind::NewTracklist,
        MessageKind::TrackMoved,
        MessageKind::RepeatChanged,
        MessageKind::CoverAvailable,
        MessageKind::SearchResult,
        MessageKind::Play,
        MessageKind::Pause,
        MessageKind::TogglePause,
        MessageKind::Stop,
        MessageKind::Next,
        MessageKind::Previous,
        MessageKind::Seek,
        MessageKind::SetVolume,
        MessageKind::TracklistAdd,
        MessageKind::TracklistClear,
        MessageKind::SetRepeat,
        MessageKind::SearchStart,
    ];

    /// Stable snake_case name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::AppStarted => "app_started",
            MessageKind::AppQuit => "app_quit",
            MessageKind::ModLoaded => "mod_loaded",
            MessageKind::ModUnloaded => "mod_unloaded",
            MessageKind::TrackChanged => "track_changed",
            MessageKind::Paused => "paused",
            MessageKind::Unpaused => "unpaused",
            MessageKind::Stopped => "stopped",
            MessageKind::TrackPosition => "track_position",
            MessageKind::TrackEndedOk => "track_ended_ok",
            MessageKind::TrackEndedError => "track_ended_error",
            MessageKind::VolumeChanged => "volume_changed",
            MessageKind::NewTracklist => "new_tracklist",
            MessageKind::TrackMoved => "track_moved",
            MessageKind::RepeatChanged => "repeat_changed",
            MessageKind::CoverAvailable => "cover_available",
            MessageKind::SearchResult => "search_result",
            MessageKind::Play => "play",
            MessageKind::Pause => "pause",
            MessageKind::TogglePause => "toggle_pause",
            MessageKind::Stop => "stop",
            MessageKind::Next => "next",
            MessageKind::Previous => "previous",
            MessageKind::Seek => "seek",
            MessageKind::SetVolume => "set_volume",
            MessageKind::TracklistAdd => "tracklist_add",
            MessageKind::TracklistClear => "tracklist_clear",
            MessageKind::SetRepeat => "set_repeat",
            MessageKind::SearchStart => "search_start",
        }
    }

    /// Commands request an action; everything else is an event.
    pub fn is_command(self) -> bool {
        matches!(
            self,
            MessageKind::Play
                | MessageKind::Pause
                | MessageKind::TogglePause
                | MessageKind::Stop
                | MessageKind::Next
                | MessageKind::Previous
                | MessageKind::Seek
                | MessageKind::SetVolume
                | MessageKind::TracklistAdd
                | MessageKind::TracklistClear
                | MessageKind::SetRepeat
                | MessageKind::SearchStart
        )
    }

    /// A worker thread stops consuming its queue after one of these.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageKind::AppQuit | MessageKind::ModUnloaded)
    }

    /// Kinds emitted only by the module manager and the shutdown path.
    pub fn is_lifecycle(self) -> bool {
        matches!(
            self,
            MessageKind::AppQuit | MessageKind::ModLoaded | MessageKind::ModUnloaded
        )
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
