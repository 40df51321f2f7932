//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style, Stylize},
    widgets::{Block, Borders, Cell, Gauge, Padding, Paragraph, Row, Table, TableState, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock};

use crate::app::{App, PlaybackState};
use crate::config::{PlaybackSettings, UiSettings};

static CONTROLS_MAP: LazyLock<BTreeMap<String, String>> = LazyLock::new(|| {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    map.insert("j/k".to_string(), "up/down".to_string());
    map.insert("gg/G".to_string(), "top/bottom".to_string());
    map.insert("enter".to_string(), "play selected song".to_string());
    map.insert("space/p".to_string(), "play/pause".to_string());
    // H/L and +/- are filled dynamically from config.
    map.insert("m".to_string(), "mute".to_string());
    map.insert("s".to_string(), "stop".to_string());
    map.insert("o".to_string(), "open folder".to_string());
    map.insert("q".to_string(), "quit".to_string());
    map
});

/// Render the controls help text, incorporating scrub seconds and volume step.
fn controls_text(playback: &PlaybackSettings) -> String {
    let order = [
        "j/k", "enter", "space/p", "H/L", "+/-", "m", "s", "gg/G", "o", "q",
    ];
    order
        .iter()
        .filter_map(|k| match *k {
            "H/L" => Some(format!("[H/L] scrub -/+{}s", playback.scrub_seconds)),
            "+/-" => Some(format!(
                "[+/-] volume -/+{}%",
                (playback.volume_step * 100.0).round()
            )),
            _ => CONTROLS_MAP.get(*k).map(|v| format!("[{}] {}", k, v)),
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

fn volume_text(app: &App) -> String {
    let pct = (app.volume.gain * 100.0).round();
    if app.volume.silent {
        format!("VOL: {pct}% (muted)")
    } else {
        format!("VOL: {pct}%")
    }
}

fn status_text(app: &App) -> String {
    if app.prompt_mode {
        return format!("Open folder: {}_", app.prompt);
    }

    let mut parts: Vec<String> = Vec::new();
    match (&app.now_playing, app.playback) {
        (Some(track), PlaybackState::Paused) => parts.push(format!("Paused: {}", track.display)),
        (Some(track), _) => parts.push(format!("Playing: {}", track.display)),
        (None, _) => parts.push("Stopped".to_string()),
    }
    parts.push(volume_text(app));
    if let Some(dir) = app.current_dir() {
        parts.push(format!("Dir: {}", dir.display()));
    }
    if let Some(msg) = &app.status {
        parts.push(msg.clone());
    }
    parts.join(" • ")
}

/// `m:ss / m:ss`, with `-:--` while the length is unknown.
fn progress_label(app: &App) -> String {
    match &app.position {
        Some(p) => format!(
            "{} / {}",
            p.elapsed_text(),
            p.duration_text().as_deref().unwrap_or("-:--")
        ),
        None => "-:-- / -:--".to_string(),
    }
}

fn dash_if_empty(s: &str) -> &str {
    if s.trim().is_empty() { "-" } else { s }
}

/// Render the entire UI into the provided `frame` using `app` state and settings.
pub fn draw(frame: &mut Frame, app: &App, ui_settings: &UiSettings, playback: &PlaybackSettings) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(4),
        ])
        .split(frame.area());

    // Header
    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" earshot ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    // Status box
    let status_par = Paragraph::new(status_text(app))
        .block(
            Block::bordered()
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                })
                .title(" status "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(status_par, chunks[1]);

    // Track table
    {
        let playing = app.now_playing.as_ref();
        let rows: Vec<Row> = app
            .catalog
            .tracks()
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let row = Row::new(vec![
                    Cell::from((i + 1).to_string()),
                    Cell::from(t.display.as_str()),
                    Cell::from(dash_if_empty(&t.artist)),
                    Cell::from(dash_if_empty(&t.album)),
                ]);
                if playing == Some(t) {
                    row.style(Style::default().fg(Color::Cyan))
                } else {
                    row
                }
            })
            .collect();

        let widths = [
            Constraint::Length(4),
            Constraint::Percentage(50),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ];
        let table = Table::new(rows, widths)
            .header(Row::new(vec!["#", "Song", "Artist", "Album"]).bold())
            .block(Block::default().borders(Borders::ALL).title(" tracks "))
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        let mut state = TableState::default();
        if app.has_tracks() {
            state.select(Some(app.selected));
        }
        frame.render_stateful_widget(table, chunks[2], &mut state);
    }

    // Progress
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" progress "))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(app.progress_ratio())
        .label(progress_label(app));
    frame.render_widget(gauge, chunks[3]);

    let footer = Paragraph::new(controls_text(playback))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                }),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(footer, chunks[4]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{PositionReport, VolumeState};
    use crate::library::Catalog;
    use std::time::Duration;

    fn idle_app() -> App {
        App::new(Catalog::default(), VolumeState::default())
    }

    #[test]
    fn controls_text_includes_configured_steps() {
        let playback = PlaybackSettings {
            scrub_seconds: 10,
            volume_step: 0.1,
            ..PlaybackSettings::default()
        };
        let text = controls_text(&playback);
        assert!(text.contains("[H/L] scrub -/+10s"));
        assert!(text.contains("[+/-] volume -/+10%"));
        assert!(text.starts_with("[j/k] up/down"));
        assert!(text.ends_with("[q] quit"));
    }

    #[test]
    fn status_shows_volume_and_mute() {
        let mut app = idle_app();
        app.volume = VolumeState {
            gain: 0.4,
            silent: true,
        };
        let text = status_text(&app);
        assert!(text.starts_with("Stopped"));
        assert!(text.contains("VOL: 40% (muted)"));
    }

    #[test]
    fn status_shows_the_prompt_while_editing() {
        let mut app = idle_app();
        app.prompt_mode = true;
        app.prompt = "/music".into();
        assert_eq!(status_text(&app), "Open folder: /music_");
    }

    #[test]
    fn status_appends_the_last_message() {
        let mut app = idle_app();
        app.set_status("could not open /nope");
        assert!(status_text(&app).ends_with("could not open /nope"));
    }

    #[test]
    fn progress_label_formats_elapsed_and_total() {
        let mut app = idle_app();
        assert_eq!(progress_label(&app), "-:-- / -:--");

        app.position = Some(PositionReport {
            track: "/m/a.mp3".into(),
            elapsed: Duration::from_secs(65),
            duration: None,
        });
        assert_eq!(progress_label(&app), "1:05 / -:--");
        assert_eq!(app.progress_ratio(), 0.0);

        if let Some(p) = app.position.as_mut() {
            p.duration = Some(Duration::from_secs(200));
        }
        assert_eq!(progress_label(&app), "1:05 / 3:20");
    }
}
