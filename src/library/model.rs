use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::LibrarySettings;
use crate::error::Result;

use super::scan::scan;

/// A playable file found by a catalog scan. Two tracks are the same track
/// when their paths are equal.
#[derive(Debug, Clone)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    /// Empty when unknown.
    pub artist: String,
    /// Empty when unknown.
    pub album: String,
    /// Only known when tags were read.
    pub duration: Option<Duration>,
    pub display: String,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Track {}

/// The tracks of one scanned directory, in directory-listing order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    root: Option<PathBuf>,
    tracks: Vec<Track>,
}

impl Catalog {
    /// Scan `dir` into a new catalog.
    pub fn load(dir: &Path, settings: &LibrarySettings) -> Result<Self> {
        let tracks = scan(dir, settings)?;
        Ok(Self {
            root: Some(dir.to_path_buf()),
            tracks,
        })
    }

    /// Replace the whole catalog with a scan of `dir`. On error the previous
    /// contents are kept.
    pub fn rescan(&mut self, dir: &Path, settings: &LibrarySettings) -> Result<()> {
        *self = Self::load(dir, settings)?;
        Ok(())
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Position of the track stored at `path`, if it is part of this catalog.
    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.tracks.iter().position(|t| t.path == path)
    }
}
