use std::path::PathBuf;

use serde::Deserialize;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/earshot/config.toml` or `~/.config/earshot/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `EARSHOT__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub playback: PlaybackSettings,
    pub library: LibrarySettings,
    pub ui: UiSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output buffer size hint (milliseconds of audio).
    pub buffer_ms: u64,
    /// How often the position reporter samples the playing stream (milliseconds).
    pub report_interval_ms: u64,
    /// Force the output device to this sample rate. Streams at other rates are
    /// converted by the mixer.
    pub sample_rate: Option<u32>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            buffer_ms: 100,
            report_interval_ms: 1000,
            sample_rate: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Initial gain, `0.0..=1.0`.
    pub volume: f32,
    /// Whether playback starts muted.
    pub muted: bool,
    /// Gain change per `+` / `-` key press.
    pub volume_step: f32,
    /// Number of seconds to scrub when pressing `H` / `L`.
    pub scrub_seconds: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            volume_step: 0.05,
            scrub_seconds: 5,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackDisplayField {
    Title,
    Artist,
    Album,
    Filename,
    Path,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether symlinked files are followed.
    pub follow_links: bool,
    /// Whether to include hidden files (dotfiles).
    pub include_hidden: bool,
    /// Read embedded tags for title/artist/album/duration.
    /// When off, the title comes from the file name and artist/album stay empty.
    pub read_tags: bool,

    /// Which fields to use to build `Track.display`.
    ///
    /// Example: ["artist", "title"] -> "Artist - Title"
    pub display_fields: Vec<TrackDisplayField>,
    /// Separator used to join `display_fields`.
    pub display_separator: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".into(), "flac".into(), "wav".into(), "ogg".into()],
            follow_links: true,
            include_hidden: true,
            read_tags: false,
            display_fields: vec![TrackDisplayField::Artist, TrackDisplayField::Title],
            display_separator: " - ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// The text rendered inside the top header box.
    pub header_text: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            header_text: " ~ earshot ~ ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is not set, e.g. `info` or `earshot=debug`.
    pub level: String,
    /// Log file. Defaults to `$XDG_STATE_HOME/earshot/earshot.log`.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
