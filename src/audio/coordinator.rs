//! The playback coordinator.
//!
//! Owns the single active playback session. Every transport operation and
//! every position sample goes through one mutex (`Device`), so pause, seek,
//! volume and teardown never interleave. Starting a track always tears the
//! previous session down first; at most one session exists at any time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{PlayerError, Result};
use crate::library::Track;

use super::backend::{AudioBackend, EndOfStream, EventSink, PlaybackStream};
use super::reporter;
use super::signal::SessionSignal;
use super::types::{
    PlaybackInfo, PlayerEvent, PositionReport, StopReason, VolumeLevel, VolumeState,
    frames_to_duration,
};

/// Cloneable handle to the coordinator. Build one at startup and pass it to
/// whatever needs to drive playback.
pub struct PlaybackCoordinator<B: AudioBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: AudioBackend> Clone for PlaybackCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(super) struct Inner<B: AudioBackend> {
    backend: B,
    device: Mutex<Device<B::Stream>>,
    events: Box<dyn EventSink>,
    report_interval: Duration,
    next_session: AtomicU64,
}

struct Device<S> {
    session: Option<Session<S>>,
    /// Last-set volume; applied to every new session.
    volume: VolumeState,
}

struct Session<S> {
    id: u64,
    track: Track,
    stream: S,
    sample_rate: u32,
    duration: Option<Duration>,
    paused: bool,
    signal: Arc<SessionSignal>,
    reporter: Option<JoinHandle<()>>,
}

impl<S: PlaybackStream> Session<S> {
    fn elapsed(&self) -> Duration {
        frames_to_duration(self.stream.position(), self.sample_rate)
    }

    fn report(&self) -> PositionReport {
        PositionReport {
            track: self.track.path.clone(),
            elapsed: self.elapsed(),
            duration: self.duration,
        }
    }
}

impl<B: AudioBackend> PlaybackCoordinator<B> {
    pub fn new(
        backend: B,
        events: impl EventSink,
        report_interval: Duration,
        volume: VolumeState,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                device: Mutex::new(Device {
                    session: None,
                    volume,
                }),
                events: Box::new(events),
                report_interval,
                next_session: AtomicU64::new(1),
            }),
        }
    }

    /// Stop whatever is playing and start `track`.
    ///
    /// When the file cannot be opened or decoded the error is returned and
    /// nothing is left playing.
    pub fn play(&self, track: &Track) -> Result<()> {
        self.inner.teardown(None, StopReason::Superseded);

        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        let signal = SessionSignal::new();
        let on_end: EndOfStream = {
            let signal = Arc::clone(&signal);
            Box::new(move || signal.mark_ended())
        };

        let mut stream = match self.inner.backend.open(track, on_end) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(track = %track.path.display(), error = %err, "could not start playback");
                return Err(err);
            }
        };

        let sample_rate = stream.sample_rate();
        let duration = stream
            .total_frames()
            .map(|frames| frames_to_duration(frames, sample_rate));

        let superseded = {
            let mut device = self.inner.lock_device();

            // Another `play` may have installed a session since the teardown above.
            let superseded = device
                .session
                .take()
                .and_then(|old| self.inner.close_session(old, StopReason::Superseded));

            let reporter = reporter::spawn(
                Arc::downgrade(&self.inner),
                id,
                Arc::clone(&signal),
                self.inner.report_interval,
            )
            .map_err(|e| PlayerError::Device(format!("failed to start position reporter: {e}")))?;

            stream.set_gain(device.volume.effective_gain());
            stream.set_paused(false);

            device.session = Some(Session {
                id,
                track: track.clone(),
                stream,
                sample_rate,
                duration,
                paused: false,
                signal,
                reporter: Some(reporter),
            });
            self.inner.events.publish(PlayerEvent::Started {
                track: track.clone(),
                duration,
            });
            superseded
        };

        if let Some(handle) = superseded {
            join_reporter(handle);
        }

        info!(
            session = id,
            track = %track.path.display(),
            sample_rate,
            ?duration,
            "now playing"
        );
        Ok(())
    }

    /// Flip the paused flag of the active session and return the new value.
    pub fn toggle_pause(&self) -> Result<bool> {
        let mut device = self.inner.lock_device();
        let Some(session) = device.session.as_mut() else {
            info!("no audio is currently playing");
            return Err(PlayerError::NoActiveSession);
        };

        session.paused = !session.paused;
        session.stream.set_paused(session.paused);
        debug!(session = session.id, paused = session.paused, "toggled pause");
        self.inner.events.publish(PlayerEvent::PauseChanged {
            paused: session.paused,
        });
        Ok(session.paused)
    }

    /// Jump to `target_secs` into the active track. Negative targets seek to
    /// the start, targets past the end are clamped to the end when the length
    /// is known.
    pub fn seek(&self, target_secs: f64) -> Result<()> {
        let mut device = self.inner.lock_device();
        let Some(session) = device.session.as_mut() else {
            debug!(target_secs, "seek requested with nothing playing");
            return Err(PlayerError::NoActiveSession);
        };

        let mut frame = (target_secs.max(0.0) * f64::from(session.sample_rate)) as u64;
        if let Some(total) = session.stream.total_frames() {
            frame = frame.min(total);
        }

        if let Err(err) = session.stream.seek(frame) {
            warn!(session = session.id, target_secs, error = %err, "seek failed");
            return Err(err);
        }

        self.inner
            .events
            .publish(PlayerEvent::Position(session.report()));
        Ok(())
    }

    /// Change the volume. The new state is always remembered for the next
    /// track; `NoActiveSession` tells the caller nothing is audible right now.
    pub fn set_volume(&self, level: VolumeLevel) -> Result<()> {
        self.update_volume(|v| v.apply(level))
    }

    /// Mute or unmute without touching the stored gain.
    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.update_volume(|v| v.silent = muted)
    }

    fn update_volume(&self, change: impl FnOnce(&mut VolumeState)) -> Result<()> {
        let mut device = self.inner.lock_device();
        change(&mut device.volume);
        let volume = device.volume;
        self.inner.events.publish(PlayerEvent::VolumeChanged(volume));

        let Some(session) = device.session.as_mut() else {
            debug!(?volume, "volume stored for the next track; nothing is playing");
            return Err(PlayerError::NoActiveSession);
        };
        session.stream.set_gain(volume.effective_gain());
        Ok(())
    }

    /// Stop the active session. Safe to call repeatedly and concurrently;
    /// returns whether this call actually stopped something.
    pub fn stop(&self) -> bool {
        let stopped = self.inner.teardown(None, StopReason::Stopped);
        if !stopped {
            debug!("stop requested with nothing playing");
        }
        stopped
    }

    /// Stop playback before the application exits.
    pub fn shutdown(&self) {
        self.stop();
        debug!("playback coordinator shut down");
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock_device().session.is_some()
    }

    pub fn position(&self) -> Option<Duration> {
        self.inner
            .lock_device()
            .session
            .as_ref()
            .map(|s| s.elapsed())
    }

    pub fn volume(&self) -> VolumeState {
        self.inner.lock_device().volume
    }

    pub fn snapshot(&self) -> PlaybackInfo {
        let device = self.inner.lock_device();
        match device.session.as_ref() {
            Some(s) => PlaybackInfo {
                track: Some(s.track.clone()),
                elapsed: s.elapsed(),
                duration: s.duration,
                playing: !s.paused,
                volume: device.volume,
            },
            None => PlaybackInfo {
                volume: device.volume,
                ..PlaybackInfo::default()
            },
        }
    }
}

impl<B: AudioBackend> Inner<B> {
    fn lock_device(&self) -> MutexGuard<'_, Device<B::Stream>> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tear down the active session, or only session `only` when given.
    /// Returns `false` when there was nothing (matching) to tear down.
    fn teardown(&self, only: Option<u64>, reason: StopReason) -> bool {
        let reporter = {
            let mut device = self.lock_device();
            let matches = match (device.session.as_ref(), only) {
                (Some(session), Some(id)) => session.id == id,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !matches {
                return false;
            }
            match device.session.take() {
                Some(session) => self.close_session(session, reason),
                None => return false,
            }
        };

        if let Some(handle) = reporter {
            join_reporter(handle);
        }
        true
    }

    /// Silence, close and release `session`. Must be called with the device
    /// lock held and the session already taken out of the slot.
    fn close_session(
        &self,
        mut session: Session<B::Stream>,
        reason: StopReason,
    ) -> Option<JoinHandle<()>> {
        session.stream.set_paused(true);
        if !session.signal.close() {
            debug!(session = session.id, "completion signal was already closed");
        }

        let Session {
            id,
            track,
            stream,
            reporter,
            ..
        } = session;
        drop(stream);

        info!(session = id, track = %track.path.display(), ?reason, "playback ended");
        self.events.publish(PlayerEvent::Stopped { track, reason });
        reporter
    }

    /// Publish the position of session `id`. Returns `false` once that session
    /// is no longer the active one.
    pub(super) fn report_position(&self, id: u64) -> bool {
        let device = self.lock_device();
        match device.session.as_ref() {
            Some(session) if session.id == id && !session.signal.is_closed() => {
                self.events.publish(PlayerEvent::Position(session.report()));
                true
            }
            _ => false,
        }
    }

    /// End-of-stream teardown for session `id`; a no-op if it is already gone.
    pub(super) fn finish(&self, id: u64) {
        if !self.teardown(Some(id), StopReason::Finished) {
            debug!(session = id, "end of stream after the session was already closed");
        }
    }
}

impl<B: AudioBackend> Drop for Inner<B> {
    fn drop(&mut self) {
        let device = self.device.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut session) = device.session.take() {
            session.stream.set_paused(true);
            session.signal.close();
        }
    }
}

fn join_reporter(handle: JoinHandle<()>) {
    // The reporter tears its own session down on end-of-stream.
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        warn!("position reporter panicked");
    }
}
