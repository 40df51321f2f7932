use std::env;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::App;
use crate::audio::{PlaybackCoordinator, PlayerEvent, RodioBackend, VolumeState};
use crate::library::Catalog;

mod event_loop;
mod logging;
mod settings;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings::load_settings();
    logging::init(&settings.log);

    let dir = match env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => env::current_dir()?,
    };

    let mut scan_error = None;
    let catalog = match Catalog::load(&dir, &settings.library) {
        Ok(catalog) => {
            info!(dir = %dir.display(), tracks = catalog.len(), "catalog loaded");
            catalog
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not scan directory");
            scan_error = Some(e.to_string());
            Catalog::default()
        }
    };

    let backend = RodioBackend::open(&settings.audio)?;
    let volume = VolumeState {
        gain: settings.playback.volume,
        silent: settings.playback.muted,
    };
    let (event_tx, event_rx) = mpsc::channel::<PlayerEvent>();
    let coordinator = PlaybackCoordinator::new(
        backend,
        event_tx,
        Duration::from_millis(settings.audio.report_interval_ms),
        volume,
    );

    let mut app = App::new(catalog, volume);
    if let Some(msg) = scan_error {
        app.set_status(msg);
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = event_loop::run(&mut terminal, &settings, &mut app, &coordinator, &event_rx);
    coordinator.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}
