use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::App;
use crate::audio::{AudioBackend, PlaybackCoordinator, PlayerEvent, VolumeLevel};
use crate::config;
use crate::error::PlayerError;
use crate::ui;

/// State tracked by the runtime event loop across iterations.
#[derive(Default)]
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
}

/// Main terminal event loop: folds coordinator events into `app`, draws and
/// handles input. Returns `Ok(())` when shutdown is requested.
pub fn run<B: AudioBackend>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    coordinator: &PlaybackCoordinator<B>,
    events: &mpsc::Receiver<PlayerEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = EventLoopState::default();
    loop {
        drain_events(app, events);

        terminal.draw(|f| ui::draw(f, app, &settings.ui, &settings.playback))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key_event(key, settings, app, coordinator, &mut state) {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn drain_events(app: &mut App, events: &mpsc::Receiver<PlayerEvent>) {
    while let Ok(event) = events.try_recv() {
        app.apply_event(&event);
    }
}

/// Handle one key press. Returns `true` when the app should quit.
fn handle_key_event<B: AudioBackend>(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    coordinator: &PlaybackCoordinator<B>,
    state: &mut EventLoopState,
) -> bool {
    if app.prompt_mode {
        state.pending_gg = false;
        match key.code {
            KeyCode::Esc => app.exit_prompt(),
            KeyCode::Backspace => app.pop_prompt_char(),
            KeyCode::Enter => {
                if let Some(dir) = app.take_prompt() {
                    open_folder(dir, settings, app, coordinator);
                }
            }
            KeyCode::Char(c) => {
                if !c.is_control() {
                    app.push_prompt_char(c);
                }
            }
            _ => {}
        }

        return false;
    }

    if key.code != KeyCode::Char('g') {
        state.pending_gg = false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('o') => app.enter_prompt(),
        KeyCode::Char('g') => {
            if state.pending_gg {
                state.pending_gg = false;
                app.select_first();
            } else {
                state.pending_gg = true;
            }
        }
        KeyCode::Char('G') => app.select_last(),
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.prev(),
        KeyCode::Enter => play_selected(app, coordinator),
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            if coordinator.is_active() {
                report(app, coordinator.toggle_pause().map(|_| ()));
            } else {
                play_selected(app, coordinator);
            }
        }
        KeyCode::Char('s') => {
            coordinator.stop();
        }
        KeyCode::Char('L') | KeyCode::Right => scrub(app, coordinator, settings, 1),
        KeyCode::Char('H') | KeyCode::Left => scrub(app, coordinator, settings, -1),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            step_volume(app, coordinator, settings.playback.volume_step)
        }
        KeyCode::Char('-') => step_volume(app, coordinator, -settings.playback.volume_step),
        KeyCode::Char('m') => {
            let muted = coordinator.volume().silent;
            quiet_when_idle(app, coordinator.set_muted(!muted));
        }
        _ => {}
    }

    false
}

/// Start the selected track. If it is already the current one it keeps its
/// position, resuming when paused.
fn play_selected<B: AudioBackend>(app: &mut App, coordinator: &PlaybackCoordinator<B>) {
    let Some(track) = app.selected_track().cloned() else {
        return;
    };
    let info = coordinator.snapshot();
    if info.track.as_ref() != Some(&track) {
        report(app, coordinator.play(&track));
    } else if !info.playing {
        report(app, coordinator.toggle_pause().map(|_| ()));
    }
}

fn scrub<B: AudioBackend>(
    app: &mut App,
    coordinator: &PlaybackCoordinator<B>,
    settings: &config::Settings,
    direction: i8,
) {
    let Some(pos) = coordinator.position() else {
        return;
    };
    let delta = f64::from(direction) * settings.playback.scrub_seconds as f64;
    report(app, coordinator.seek(pos.as_secs_f64() + delta));
}

fn step_volume<B: AudioBackend>(app: &mut App, coordinator: &PlaybackCoordinator<B>, delta: f32) {
    let gain = coordinator.volume().gain + delta;
    quiet_when_idle(app, coordinator.set_volume(VolumeLevel::Gain(gain)));
}

/// Stop playback and load `dir` as the new catalog.
fn open_folder<B: AudioBackend>(
    dir: PathBuf,
    settings: &config::Settings,
    app: &mut App,
    coordinator: &PlaybackCoordinator<B>,
) {
    coordinator.stop();
    match app.rescan(&dir, &settings.library) {
        Ok(()) => {
            info!(dir = %dir.display(), tracks = app.catalog.len(), "folder opened");
            app.set_status(format!("{} tracks", app.catalog.len()));
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not open folder");
            app.set_status(e.to_string());
        }
    }
}

/// Show a failed action on the status line; clear it on success.
fn report(app: &mut App, result: Result<(), PlayerError>) {
    match result {
        Ok(()) => app.clear_status(),
        Err(e) => app.set_status(e.to_string()),
    }
}

/// Volume changes are remembered for the next track, so "nothing playing"
/// is not worth a status message.
fn quiet_when_idle(app: &mut App, result: Result<(), PlayerError>) {
    match result {
        Err(PlayerError::NoActiveSession) => {}
        other => report(app, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{EndOfStream, PlaybackStream, VolumeState};
    use crate::library::{Catalog, Track};
    use crossterm::event::KeyModifiers;
    use std::fs;
    use tempfile::TempDir;

    /// A device that accepts every file and plays silence forever.
    struct NullBackend;

    struct NullStream {
        frame: u64,
    }

    impl AudioBackend for NullBackend {
        type Stream = NullStream;

        fn open(&self, _track: &Track, _on_end: EndOfStream) -> Result<NullStream, PlayerError> {
            Ok(NullStream { frame: 0 })
        }
    }

    impl PlaybackStream for NullStream {
        fn sample_rate(&self) -> u32 {
            1_000
        }

        fn total_frames(&self) -> Option<u64> {
            Some(60_000)
        }

        fn position(&self) -> u64 {
            self.frame
        }

        fn set_paused(&mut self, _paused: bool) {}

        fn set_gain(&mut self, _gain: f32) {}

        fn seek(&mut self, frame: u64) -> Result<(), PlayerError> {
            self.frame = frame;
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        settings: config::Settings,
        app: App,
        player: PlaybackCoordinator<NullBackend>,
        events: mpsc::Receiver<PlayerEvent>,
        state: EventLoopState,
    }

    impl Fixture {
        fn new(names: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            for name in names {
                fs::write(dir.path().join(name), b"").unwrap();
            }
            let settings = config::Settings::default();
            let catalog = Catalog::load(dir.path(), &settings.library).unwrap();
            let (tx, rx) = mpsc::channel();
            let player = PlaybackCoordinator::new(
                NullBackend,
                tx,
                Duration::from_secs(60),
                VolumeState::default(),
            );
            Self {
                dir,
                app: App::new(catalog, VolumeState::default()),
                settings,
                player,
                events: rx,
                state: EventLoopState::default(),
            }
        }

        fn press(&mut self, code: KeyCode) -> bool {
            let quit = handle_key_event(
                KeyEvent::new(code, KeyModifiers::NONE),
                &self.settings,
                &mut self.app,
                &self.player,
                &mut self.state,
            );
            drain_events(&mut self.app, &self.events);
            quit
        }

        fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                self.press(KeyCode::Char(c));
            }
        }
    }

    #[test]
    fn q_quits() {
        let mut f = Fixture::new(&[]);
        assert!(!f.press(KeyCode::Char('j')));
        assert!(f.press(KeyCode::Char('q')));
    }

    #[test]
    fn gg_jumps_to_top_and_capital_g_to_bottom() {
        let mut f = Fixture::new(&["a.mp3", "b.mp3", "c.mp3"]);
        f.press(KeyCode::Char('G'));
        assert_eq!(f.app.selected, 2);

        f.press(KeyCode::Char('g'));
        assert_eq!(f.app.selected, 2);
        f.press(KeyCode::Char('g'));
        assert_eq!(f.app.selected, 0);

        // A different key in between cancels the prefix.
        f.press(KeyCode::Char('j'));
        f.press(KeyCode::Char('g'));
        f.press(KeyCode::Char('k'));
        f.press(KeyCode::Char('g'));
        assert_eq!(f.app.selected, 0);
    }

    #[test]
    fn enter_plays_the_selected_track() {
        let mut f = Fixture::new(&["a.mp3", "b.mp3"]);
        f.press(KeyCode::Down);
        f.press(KeyCode::Enter);

        assert!(f.player.is_active());
        assert_eq!(f.app.now_playing.as_ref(), f.app.catalog.get(1));
    }

    #[test]
    fn space_starts_then_toggles_pause() {
        let mut f = Fixture::new(&["a.mp3"]);
        f.press(KeyCode::Char(' '));
        assert!(f.player.snapshot().playing);

        f.press(KeyCode::Char(' '));
        assert!(!f.player.snapshot().playing);
        assert_eq!(f.app.playback, crate::app::PlaybackState::Paused);

        f.press(KeyCode::Char('p'));
        assert!(f.player.snapshot().playing);
    }

    #[test]
    fn scrub_moves_relative_to_the_current_position() {
        let mut f = Fixture::new(&["a.mp3"]);
        f.press(KeyCode::Enter);

        f.press(KeyCode::Char('L'));
        f.press(KeyCode::Char('L'));
        assert_eq!(f.player.position(), Some(Duration::from_secs(10)));

        f.press(KeyCode::Char('H'));
        assert_eq!(f.player.position(), Some(Duration::from_secs(5)));
        f.press(KeyCode::Left);
        f.press(KeyCode::Left);
        assert_eq!(f.player.position(), Some(Duration::ZERO));
        assert!(f.app.status.is_none());
    }

    #[test]
    fn enter_on_the_paused_track_resumes_where_it_was() {
        let mut f = Fixture::new(&["a.mp3", "b.mp3"]);
        f.press(KeyCode::Enter);
        f.press(KeyCode::Char('L'));
        f.press(KeyCode::Char(' '));
        assert!(!f.player.snapshot().playing);

        f.press(KeyCode::Enter);
        assert!(f.player.snapshot().playing);
        assert_eq!(f.player.position(), Some(Duration::from_secs(5)));
        assert_eq!(f.app.playback, crate::app::PlaybackState::Playing);

        // Enter on the track that is already playing leaves it alone.
        f.press(KeyCode::Enter);
        assert!(f.player.snapshot().playing);
        assert_eq!(f.player.position(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn volume_keys_step_and_mute_even_when_idle() {
        let mut f = Fixture::new(&[]);
        f.press(KeyCode::Char('-'));
        f.press(KeyCode::Char('-'));
        assert!((f.player.volume().gain - 0.9).abs() < 1e-6);
        assert!((f.app.volume.gain - 0.9).abs() < 1e-6);

        f.press(KeyCode::Char('m'));
        assert!(f.player.volume().silent);
        assert!(f.app.volume.silent);
        assert!(f.app.status.is_none());

        f.press(KeyCode::Char('+'));
        assert!(!f.player.volume().silent);
    }

    #[test]
    fn stop_key_stops_playback() {
        let mut f = Fixture::new(&["a.mp3"]);
        f.press(KeyCode::Enter);
        f.press(KeyCode::Char('s'));

        assert!(!f.player.is_active());
        assert!(f.app.now_playing.is_none());
    }

    #[test]
    fn folder_prompt_stops_playback_and_rescans() {
        let mut f = Fixture::new(&["a.mp3"]);
        f.press(KeyCode::Enter);

        let other = tempfile::tempdir().unwrap();
        fs::write(other.path().join("x.mp3"), b"").unwrap();
        fs::write(other.path().join("y.flac"), b"").unwrap();

        f.press(KeyCode::Char('o'));
        assert!(f.app.prompt_mode);
        assert_eq!(f.app.prompt, f.dir.path().display().to_string());

        f.app.prompt.clear();
        f.type_text(&other.path().display().to_string());
        f.press(KeyCode::Enter);

        assert!(!f.app.prompt_mode);
        assert!(!f.player.is_active());
        assert_eq!(f.app.catalog.len(), 2);
        assert_eq!(f.app.current_dir(), Some(other.path()));
        assert_eq!(f.app.status.as_deref(), Some("2 tracks"));
    }

    #[test]
    fn folder_prompt_reports_a_bad_directory() {
        let mut f = Fixture::new(&["a.mp3"]);
        f.press(KeyCode::Char('o'));
        f.press(KeyCode::Char('x'));
        f.press(KeyCode::Backspace);
        f.type_text("/definitely/not/here");
        f.press(KeyCode::Enter);

        assert_eq!(f.app.catalog.len(), 1);
        assert!(f.app.status.is_some());
    }

    #[test]
    fn escape_leaves_the_prompt_without_rescanning() {
        let mut f = Fixture::new(&["a.mp3"]);
        f.press(KeyCode::Char('o'));
        f.type_text("q");
        assert!(!f.press(KeyCode::Esc));
        assert!(!f.app.prompt_mode);
        assert_eq!(f.app.current_dir(), Some(f.dir.path()));
    }
}
