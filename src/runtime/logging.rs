use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{self, LogSettings};

/// Route `tracing` output to the log file. The terminal belongs to the TUI,
/// so when no file can be opened logging stays off.
pub fn init(settings: &LogSettings) {
    let Some(path) = log_file(settings) else {
        return;
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("earshot: cannot create log directory {}: {e}", parent.display());
            return;
        }
    }
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("earshot: cannot open log file {}: {e}", path.display());
            return;
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(&settings.level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

fn log_file(settings: &LogSettings) -> Option<PathBuf> {
    settings.file.clone().or_else(config::default_log_path)
}

/// `RUST_LOG` wins over the configured level; a bad directive falls back to `info`.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
