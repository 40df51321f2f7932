use std::borrow::Cow;
use std::io;
use std::path::Path;
use std::time::Duration;

use lofty::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::{PlayerError, Result};

use super::display::display_from_fields;
use super::model::Track;

fn normalized_extensions(settings: &LibrarySettings) -> Vec<String> {
    settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn is_audio_file(path: &Path, exts: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn non_empty(value: Option<Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// List the playable files directly inside `dir`.
///
/// Subdirectories are skipped, not descended into. Tracks come back in the
/// order the directory listing yields them; callers must not rely on sorting.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Result<Vec<Track>> {
    let exts = normalized_extensions(settings);
    let mut tracks: Vec<Track> = Vec::new();

    let walker = WalkDir::new(dir)
        .follow_links(settings.follow_links)
        .max_depth(1);

    for entry in walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 || err.path() == Some(dir) => {
                return Err(PlayerError::Io {
                    path: dir.to_path_buf(),
                    source: io::Error::from(err),
                });
            }
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };

        if entry.depth() == 0 {
            if !entry.path().is_dir() {
                return Err(PlayerError::Io {
                    path: dir.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
                });
            }
            continue;
        }

        let path = entry.path();
        let is_file = if settings.follow_links {
            path.is_file()
        } else {
            entry.file_type().is_file()
        };
        if is_file && is_audio_file(path, &exts) {
            tracks.push(build_track(path, settings));
        }
    }

    debug!(dir = %dir.display(), count = tracks.len(), "scanned directory");
    Ok(tracks)
}

fn build_track(path: &Path, settings: &LibrarySettings) -> Track {
    let mut title = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let mut artist = String::new();
    let mut album = String::new();
    let mut duration: Option<Duration> = None;

    if settings.read_tags {
        match lofty::read_from_path(path) {
            Ok(tagged) => {
                duration = Some(tagged.properties().duration());

                if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                    if let Some(v) = non_empty(tag.title()) {
                        title = v;
                    }
                    if let Some(v) = non_empty(tag.artist()) {
                        artist = v;
                    }
                    if let Some(v) = non_empty(tag.album()) {
                        album = v;
                    }
                }
            }
            Err(err) => debug!(path = %path.display(), error = %err, "no readable tags"),
        }
    }

    let display = display_from_fields(
        path,
        &title,
        &artist,
        &album,
        &settings.display_fields,
        &settings.display_separator,
    );

    Track {
        path: path.to_path_buf(),
        title,
        artist,
        album,
        duration,
        display,
    }
}
