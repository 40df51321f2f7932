use super::*;
use crate::audio::{PlayerEvent, PositionReport, StopReason, VolumeState};
use crate::config::LibrarySettings;
use crate::library::Catalog;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// A catalog over a temp dir holding `names` as empty files.
fn catalog(names: &[&str]) -> (TempDir, Catalog) {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        fs::write(dir.path().join(name), b"").unwrap();
    }
    let catalog = Catalog::load(dir.path(), &LibrarySettings::default()).unwrap();
    (dir, catalog)
}

fn app_with(names: &[&str]) -> (TempDir, App) {
    let (dir, catalog) = catalog(names);
    (dir, App::new(catalog, VolumeState::default()))
}

fn started(app: &App, idx: usize) -> PlayerEvent {
    let track = app.catalog.get(idx).unwrap().clone();
    PlayerEvent::Started {
        duration: Some(Duration::from_secs(200)),
        track,
    }
}

#[test]
fn next_and_prev_wrap_around() {
    let (_dir, mut app) = app_with(&["a.mp3"]);
    app.next();
    assert_eq!(app.selected, 0);

    let (_dir, mut app) = app_with(&["a.mp3", "b.mp3", "c.mp3"]);
    app.prev();
    assert_eq!(app.selected, 2);
    app.next();
    assert_eq!(app.selected, 0);
    app.next();
    assert_eq!(app.selected, 1);
}

#[test]
fn navigation_on_an_empty_catalog_is_a_no_op() {
    let (_dir, mut app) = app_with(&[]);
    app.next();
    app.prev();
    app.select_last();
    assert_eq!(app.selected, 0);
    assert!(!app.has_tracks());
    assert!(app.selected_track().is_none());
}

#[test]
fn started_event_moves_the_cursor_to_the_playing_track() {
    let (_dir, mut app) = app_with(&["a.mp3", "b.mp3", "c.mp3"]);
    let event = started(&app, 2);
    app.apply_event(&event);

    assert_eq!(app.playback, PlaybackState::Playing);
    assert_eq!(app.selected, 2);
    let position = app.position.as_ref().unwrap();
    assert_eq!(position.elapsed, Duration::ZERO);
    assert_eq!(position.duration, Some(Duration::from_secs(200)));
    assert_eq!(app.now_playing.as_ref(), app.catalog.get(2));
}

#[test]
fn position_reports_for_other_tracks_are_ignored() {
    let (_dir, mut app) = app_with(&["a.mp3", "b.mp3"]);
    let event = started(&app, 0);
    app.apply_event(&event);
    let a = app.catalog.get(0).unwrap().path.clone();
    let b = app.catalog.get(1).unwrap().path.clone();

    app.apply_event(&PlayerEvent::Position(PositionReport {
        track: b,
        elapsed: Duration::from_secs(90),
        duration: None,
    }));
    assert_eq!(app.position.as_ref().unwrap().elapsed, Duration::ZERO);

    app.apply_event(&PlayerEvent::Position(PositionReport {
        track: a,
        elapsed: Duration::from_secs(50),
        duration: Some(Duration::from_secs(200)),
    }));
    assert_eq!(app.position.as_ref().unwrap().elapsed, Duration::from_secs(50));
    assert_eq!(app.progress_ratio(), 0.25);
}

#[test]
fn pause_and_stop_events_update_the_playback_state() {
    let (_dir, mut app) = app_with(&["a.mp3"]);

    app.apply_event(&PlayerEvent::PauseChanged { paused: true });
    assert_eq!(app.playback, PlaybackState::Stopped);

    let event = started(&app, 0);
    app.apply_event(&event);
    app.apply_event(&PlayerEvent::PauseChanged { paused: true });
    assert_eq!(app.playback, PlaybackState::Paused);

    let track = app.catalog.get(0).unwrap().clone();
    app.apply_event(&PlayerEvent::Stopped {
        track,
        reason: StopReason::Finished,
    });
    assert_eq!(app.playback, PlaybackState::Stopped);
    assert!(app.now_playing.is_none());
    assert!(app.position.is_none());
    assert_eq!(app.progress_ratio(), 0.0);
}

#[test]
fn stale_stop_does_not_clear_the_new_track() {
    let (_dir, mut app) = app_with(&["a.mp3", "b.mp3"]);
    let old = app.catalog.get(0).unwrap().clone();
    let event = started(&app, 1);
    app.apply_event(&event);

    app.apply_event(&PlayerEvent::Stopped {
        track: old,
        reason: StopReason::Superseded,
    });
    assert_eq!(app.playback, PlaybackState::Playing);
    assert!(app.now_playing.is_some());
}

#[test]
fn volume_events_are_mirrored() {
    let (_dir, mut app) = app_with(&[]);
    let volume = VolumeState {
        gain: 0.4,
        silent: true,
    };
    app.apply_event(&PlayerEvent::VolumeChanged(volume));
    assert_eq!(app.volume, volume);
}

#[test]
fn prompt_is_prefilled_with_the_current_dir() {
    let (dir, mut app) = app_with(&[]);
    app.enter_prompt();
    assert!(app.prompt_mode);
    assert_eq!(app.prompt, dir.path().display().to_string());

    app.prompt.clear();
    for c in " /music/jazz  ".chars() {
        app.push_prompt_char(c);
    }
    app.pop_prompt_char();
    assert_eq!(
        app.take_prompt(),
        Some(std::path::PathBuf::from("/music/jazz"))
    );
    assert!(!app.prompt_mode);

    app.enter_prompt();
    app.prompt = "   ".into();
    assert_eq!(app.take_prompt(), None);
}

#[test]
fn rescan_keeps_the_cursor_on_the_playing_track() {
    let (dir, mut app) = app_with(&["a.mp3", "b.mp3"]);
    let event = started(&app, 1);
    app.apply_event(&event);
    let playing = app.catalog.get(1).unwrap().path.clone();

    fs::write(dir.path().join("c.mp3"), b"").unwrap();
    app.rescan(dir.path(), &LibrarySettings::default()).unwrap();
    assert_eq!(app.catalog.len(), 3);
    assert_eq!(Some(app.selected), app.catalog.position_of(&playing));

    let other = tempfile::tempdir().unwrap();
    fs::write(other.path().join("z.mp3"), b"").unwrap();
    app.rescan(other.path(), &LibrarySettings::default()).unwrap();
    assert_eq!(app.selected, 0);
    assert_eq!(app.current_dir(), Some(other.path()));
}

#[test]
fn failed_rescan_keeps_the_catalog() {
    let (dir, mut app) = app_with(&["a.mp3"]);
    let missing = dir.path().join("nope");

    assert!(app.rescan(&missing, &LibrarySettings::default()).is_err());
    assert_eq!(app.catalog.len(), 1);
    assert_eq!(app.current_dir(), Some(dir.path()));
}
