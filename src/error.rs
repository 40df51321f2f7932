//! Error type shared by the catalog and the playback coordinator.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// A directory or file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The track file does not exist.
    #[error("no such file: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be decoded.
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The active stream does not support the requested operation.
    #[error("{0} is not supported by the current stream")]
    Unsupported(&'static str),

    /// The decoder failed while repositioning.
    #[error("seek failed: {0}")]
    Seek(String),

    /// Pause/seek/volume requested while nothing is playing.
    #[error("nothing is playing")]
    NoActiveSession,

    /// The audio output device could not be opened.
    #[error("audio device error: {0}")]
    Device(String),
}

impl PlayerError {
    /// Map a failure to open `path`, keeping "missing" distinct from other I/O errors.
    pub fn open(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
