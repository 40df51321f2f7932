//! Contracts between the coordinator and the things it drives: the output
//! device (decode + register a stream) and the presentation layer (events).

use std::sync::mpsc::Sender;

use crate::error::Result;
use crate::library::Track;

use super::types::PlayerEvent;

/// Run by the output side once a stream has played its last sample.
///
/// It runs on the audio callback path and must not block.
pub type EndOfStream = Box<dyn FnOnce() + Send + 'static>;

/// Decodes tracks and registers them with an output device.
pub trait AudioBackend: Send + Sync + 'static {
    type Stream: PlaybackStream;

    /// Open and decode `track` and register it with the device, paused.
    /// `on_end` fires at most once, when the stream runs out of data.
    fn open(&self, track: &Track, on_end: EndOfStream) -> Result<Self::Stream>;
}

/// A decoded stream registered with the device. Dropping it releases the
/// stream and detaches it from the device.
pub trait PlaybackStream: Send + 'static {
    /// Native sample rate in frames per second.
    fn sample_rate(&self) -> u32;
    /// Total length in frames, when the container reports it.
    fn total_frames(&self) -> Option<u64>;
    /// Frames played so far.
    fn position(&self) -> u64;
    fn set_paused(&mut self, paused: bool);
    fn set_gain(&mut self, gain: f32);
    /// Reposition to `frame`. Streams that cannot seek return
    /// [`PlayerError::Unsupported`](crate::error::PlayerError::Unsupported).
    fn seek(&mut self, frame: u64) -> Result<()>;
}

/// The single notification port towards the presentation layer.
///
/// `publish` is called with the device lock held; implementations must hand
/// the event off quickly and must not call back into the coordinator.
pub trait EventSink: Send + Sync + 'static {
    fn publish(&self, event: PlayerEvent);
}

impl EventSink for Sender<PlayerEvent> {
    fn publish(&self, event: PlayerEvent) {
        // A closed receiver just means nobody is listening any more.
        let _ = self.send(event);
    }
}
