use std::path::Path;

use crate::config::TrackDisplayField;

/// Build a display string for a track according to the provided `fields` and separator.
///
/// This composes metadata fields (artist, title, album, filename, path) in the
/// configured order and falls back to `title` when no parts were produced.
pub fn display_from_fields(
    path: &Path,
    title: &str,
    artist: &str,
    album: &str,
    fields: &[TrackDisplayField],
    sep: &str,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    for f in fields {
        let part = match f {
            TrackDisplayField::Title => title.trim().to_string(),
            TrackDisplayField::Artist => artist.trim().to_string(),
            TrackDisplayField::Album => album.trim().to_string(),
            TrackDisplayField::Filename => path
                .file_stem()
                .map(|s| s.to_string_lossy().trim().to_string())
                .unwrap_or_default(),
            TrackDisplayField::Path => path.display().to_string(),
        };
        if !part.is_empty() {
            parts.push(part);
        }
    }

    if parts.is_empty() {
        title.to_string()
    } else {
        parts.join(sep)
    }
}
