//! Audio-related small types shared with the presentation layer.
//!
//! This module defines the volume model, the events published by the
//! coordinator and the snapshot type returned to callers.

use std::path::PathBuf;
use std::time::Duration;

use crate::library::Track;

/// A volume request for the active session.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum VolumeLevel {
    /// Hard mute. The stored gain is left untouched.
    Lowest,
    /// Linear gain, clamped to `0.0..=1.0`. Clears the mute.
    Gain(f32),
}

/// The gain and mute flag kept by the coordinator across sessions.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VolumeState {
    pub gain: f32,
    pub silent: bool,
}

impl Default for VolumeState {
    fn default() -> Self {
        Self {
            gain: 1.0,
            silent: false,
        }
    }
}

impl VolumeState {
    pub fn apply(&mut self, level: VolumeLevel) {
        match level {
            VolumeLevel::Lowest => self.silent = true,
            VolumeLevel::Gain(g) => {
                self.gain = clamp_gain(g);
                self.silent = false;
            }
        }
    }

    /// The gain actually sent to the output stage.
    pub fn effective_gain(&self) -> f32 {
        if self.silent { 0.0 } else { self.gain }
    }
}

fn clamp_gain(g: f32) -> f32 {
    if g.is_nan() { 0.0 } else { g.clamp(0.0, 1.0) }
}

/// Why a session ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called.
    Stopped,
    /// The stream ran out of data.
    Finished,
    /// A new track was started.
    Superseded,
}

/// One position sample taken by the reporter.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub track: PathBuf,
    pub elapsed: Duration,
    pub duration: Option<Duration>,
}

impl PositionReport {
    pub fn elapsed_text(&self) -> String {
        clock_text(self.elapsed)
    }

    pub fn duration_text(&self) -> Option<String> {
        self.duration.map(clock_text)
    }

    /// Upper bound for a seek slider, in seconds.
    pub fn slider_max(&self) -> f64 {
        self.duration.map_or(0.0, |d| d.as_secs_f64())
    }
}

/// Notifications sent to the presentation layer.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Started {
        track: Track,
        duration: Option<Duration>,
    },
    Position(PositionReport),
    PauseChanged {
        paused: bool,
    },
    VolumeChanged(VolumeState),
    Stopped {
        track: Track,
        reason: StopReason,
    },
}

#[derive(Debug, Clone, Default)]
/// Runtime playback information for callers that poll instead of listening.
pub struct PlaybackInfo {
    /// Currently playing track (if any).
    pub track: Option<Track>,
    /// Elapsed playback time for the current track.
    pub elapsed: Duration,
    pub duration: Option<Duration>,
    /// Whether playback is currently active and unpaused.
    pub playing: bool,
    pub volume: VolumeState,
}

/// Format `d` as `m:ss`, rounded to the nearest second.
pub fn clock_text(d: Duration) -> String {
    let secs = d.as_secs_f64().round() as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub(crate) fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / f64::from(sample_rate))
}

pub(crate) fn duration_to_frames(d: Duration, sample_rate: u32) -> u64 {
    (d.as_secs_f64() * f64::from(sample_rate)).round() as u64
}
