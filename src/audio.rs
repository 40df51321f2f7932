//! Playback: the single-session coordinator, its position reporter and the
//! `rodio` output device it drives.

mod backend;
mod coordinator;
mod device;
mod reporter;
mod signal;
mod types;

pub use backend::{AudioBackend, EndOfStream, EventSink, PlaybackStream};
pub use coordinator::PlaybackCoordinator;
pub use device::RodioBackend;
pub use types::*;
