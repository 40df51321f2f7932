//! Application model types: `App` and `PlaybackState`.
//!
//! The `App` struct holds the catalog, the selection and a mirror of the
//! coordinator's state, rebuilt from the events it publishes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{PlayerEvent, PositionReport, VolumeState};
use crate::config::LibrarySettings;
use crate::error::Result;
use crate::library::{Catalog, Track};

/// The playback state of the application.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// The main application model.
pub struct App {
    pub catalog: Catalog,
    pub selected: usize,
    pub playback: PlaybackState,

    pub now_playing: Option<Track>,
    /// Latest position of `now_playing`.
    pub position: Option<PositionReport>,
    pub volume: VolumeState,

    /// One-line message shown in the status box (errors, rescan results).
    pub status: Option<String>,

    pub prompt_mode: bool,
    pub prompt: String,
}

impl App {
    /// Create a new `App` over `catalog`, starting from `volume`.
    pub fn new(catalog: Catalog, volume: VolumeState) -> Self {
        Self {
            catalog,
            selected: 0,
            playback: PlaybackState::Stopped,
            now_playing: None,
            position: None,
            volume,
            status: None,
            prompt_mode: false,
            prompt: String::new(),
        }
    }

    /// Return true if the catalog contains any tracks.
    pub fn has_tracks(&self) -> bool {
        !self.catalog.is_empty()
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.catalog.get(self.selected)
    }

    pub fn current_dir(&self) -> Option<&Path> {
        self.catalog.root()
    }

    /// Move selection to the next track, wrapping to the first.
    pub fn next(&mut self) {
        if self.has_tracks() {
            self.selected = (self.selected + 1) % self.catalog.len();
        }
    }

    /// Move selection to the previous track, wrapping to the last.
    pub fn prev(&mut self) {
        let len = self.catalog.len();
        if len > 0 {
            self.selected = (self.selected + len - 1) % len;
        }
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.catalog.len().saturating_sub(1);
    }

    /// Rescan `dir` into the catalog and reset the cursor, keeping it on the
    /// playing track when that is still listed. On error nothing changes.
    pub fn rescan(&mut self, dir: &Path, settings: &LibrarySettings) -> Result<()> {
        self.catalog.rescan(dir, settings)?;
        self.selected = self
            .now_playing
            .as_ref()
            .and_then(|t| self.catalog.position_of(&t.path))
            .unwrap_or(0);
        Ok(())
    }

    /// Fold one coordinator event into the model.
    pub fn apply_event(&mut self, event: &PlayerEvent) {
        match event {
            PlayerEvent::Started { track, duration } => {
                self.now_playing = Some(track.clone());
                self.position = Some(PositionReport {
                    track: track.path.clone(),
                    elapsed: Duration::ZERO,
                    duration: duration.or(track.duration),
                });
                self.playback = PlaybackState::Playing;
                if let Some(idx) = self.catalog.position_of(&track.path) {
                    self.selected = idx;
                }
            }
            PlayerEvent::Position(report) => {
                if self.is_now_playing(&report.track) {
                    self.position = Some(report.clone());
                }
            }
            PlayerEvent::PauseChanged { paused } => {
                if self.now_playing.is_some() {
                    self.playback = if *paused {
                        PlaybackState::Paused
                    } else {
                        PlaybackState::Playing
                    };
                }
            }
            PlayerEvent::VolumeChanged(volume) => self.volume = *volume,
            PlayerEvent::Stopped { track, .. } => {
                if self.is_now_playing(&track.path) {
                    self.now_playing = None;
                    self.position = None;
                    self.playback = PlaybackState::Stopped;
                }
            }
        }
    }

    fn is_now_playing(&self, path: &Path) -> bool {
        self.now_playing.as_ref().is_some_and(|t| t.path == path)
    }

    /// Fraction of the current track already played, `0.0` when unknown.
    pub fn progress_ratio(&self) -> f64 {
        match &self.position {
            Some(p) if p.slider_max() > 0.0 => {
                (p.elapsed.as_secs_f64() / p.slider_max()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Open the folder prompt, prefilled with the current directory.
    pub fn enter_prompt(&mut self) {
        self.prompt_mode = true;
        self.prompt = self
            .current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
    }

    pub fn exit_prompt(&mut self) {
        self.prompt_mode = false;
        self.prompt.clear();
    }

    pub fn push_prompt_char(&mut self, c: char) {
        self.prompt.push(c);
    }

    pub fn pop_prompt_char(&mut self) {
        self.prompt.pop();
    }

    /// Close the prompt and return the entered directory, if any.
    pub fn take_prompt(&mut self) -> Option<PathBuf> {
        let entered = self.prompt.trim().to_string();
        self.exit_prompt();
        (!entered.is_empty()).then(|| PathBuf::from(entered))
    }
}
