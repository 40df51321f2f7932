//! The `rodio` output device.
//!
//! `OutputStream` is not `Send`, so it lives on a dedicated `audio-output`
//! thread for the lifetime of the backend; everything else talks to its
//! mixer, which is. Each session gets its own `Sink` on that mixer.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rodio::cpal::BufferSize;
use rodio::decoder::symphonia;
use rodio::mixer::Mixer;
use rodio::source::SeekError;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{debug, info, warn};

use crate::config::AudioSettings;
use crate::error::{PlayerError, Result};
use crate::library::Track;

use super::backend::{AudioBackend, EndOfStream, PlaybackStream};
use super::types::{duration_to_frames, frames_to_duration};

/// Rate used to size the output buffer when no rate is forced.
const FALLBACK_RATE: u32 = 44_100;

pub struct RodioBackend {
    mixer: Mixer,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RodioBackend {
    /// Open the default output device.
    pub fn open(settings: &AudioSettings) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<Mixer>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let buffer_ms = settings.buffer_ms;
        let sample_rate = settings.sample_rate;

        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match open_stream(buffer_ms, sample_rate) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(stream.mixer().clone()));

                // Park until the backend is dropped (sender dropped or signalled).
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("audio output closed");
            })
            .map_err(|e| PlayerError::Device(format!("failed to start audio thread: {e}")))?;

        let mixer = ready_rx
            .recv()
            .map_err(|_| PlayerError::Device("audio thread exited during startup".to_string()))??;

        Ok(Self {
            mixer,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

fn open_stream(buffer_ms: u64, sample_rate: Option<u32>) -> Result<OutputStream> {
    let device_err = |e: rodio::StreamError| PlayerError::Device(e.to_string());

    let rate = sample_rate.unwrap_or(FALLBACK_RATE);
    let frames = (u64::from(rate) * buffer_ms / 1000).clamp(1, u64::from(u32::MAX)) as u32;

    let mut builder = OutputStreamBuilder::from_default_device()
        .map_err(device_err)?
        .with_buffer_size(BufferSize::Fixed(frames));
    if let Some(rate) = sample_rate {
        builder = builder.with_sample_rate(rate);
    }

    let mut stream = builder.open_stream_or_fallback().map_err(device_err)?;
    // rodio logs to stderr when OutputStream is dropped, which would garble the TUI.
    stream.log_on_drop(false);
    info!(buffer_frames = frames, ?sample_rate, "audio output opened");
    Ok(stream)
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("audio output thread panicked");
            }
        }
    }
}

impl AudioBackend for RodioBackend {
    type Stream = RodioStream;

    fn open(&self, track: &Track, on_end: EndOfStream) -> Result<RodioStream> {
        let decoder = decode(&track.path)?;
        Ok(RodioStream::attach(
            Sink::connect_new(&self.mixer),
            decoder,
            on_end,
        ))
    }
}

fn decode(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path).map_err(|e| PlayerError::open(path, e))?;
    // `try_from` records the byte length and marks the reader seekable;
    // without both symphonia can only seek forward.
    Decoder::try_from(file).map_err(|e| PlayerError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// One session's sink on the shared mixer.
pub struct RodioStream {
    sink: Sink,
    sample_rate: u32,
    total_frames: Option<u64>,
}

impl RodioStream {
    /// Queue `source` on `sink`, paused.
    fn attach<S>(sink: Sink, source: S, on_end: EndOfStream) -> Self
    where
        S: Source<Item = f32> + Send + 'static,
    {
        let sample_rate = source.sample_rate();
        let total_frames = source
            .total_duration()
            .map(|d| duration_to_frames(d, sample_rate));

        sink.pause();
        sink.append(NotifyOnEnd::new(source, on_end));

        Self {
            sink,
            sample_rate,
            total_frames,
        }
    }
}

impl PlaybackStream for RodioStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn position(&self) -> u64 {
        duration_to_frames(self.sink.get_pos(), self.sample_rate)
    }

    fn set_paused(&mut self, paused: bool) {
        if paused {
            self.sink.pause();
        } else {
            self.sink.play();
        }
    }

    fn set_gain(&mut self, gain: f32) {
        self.sink.set_volume(gain);
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        let pos = frames_to_duration(frame, self.sample_rate);
        self.sink.try_seek(pos).map_err(seek_error)
    }
}

fn seek_error(err: SeekError) -> PlayerError {
    match err {
        SeekError::NotSupported { .. }
        | SeekError::SymphoniaDecoder(
            symphonia::SeekError::RandomAccessNotSupported
            | symphonia::SeekError::AccurateSeekNotSupported,
        ) => PlayerError::Unsupported("seeking"),
        other => PlayerError::Seek(other.to_string()),
    }
}

impl Drop for RodioStream {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

/// Source wrapper that runs a hook once the inner source is exhausted.
struct NotifyOnEnd<S> {
    inner: S,
    on_end: Option<EndOfStream>,
}

impl<S> NotifyOnEnd<S> {
    fn new(inner: S, on_end: EndOfStream) -> Self {
        Self {
            inner,
            on_end: Some(on_end),
        }
    }
}

impl<S> Iterator for NotifyOnEnd<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next();
        if sample.is_none() {
            if let Some(hook) = self.on_end.take() {
                hook();
            }
        }
        sample
    }
}

impl<S> Source for NotifyOnEnd<S>
where
    S: Source<Item = f32>,
{
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> std::result::Result<(), SeekError> {
        self.inner.try_seek(pos)
    }
}
