use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use super::app::{App, METER_FLOOR_DB};
use crate::config::OutputMode;

/// Render the TUI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Status
            Constraint::Length(5), // Note
            Constraint::Length(3), // Level meter
            Constraint::Length(3), // Stability
            Constraint::Min(0),    // Mapping
            Constraint::Length(4), // Help
        ])
        .split(frame.size());

    render_title(frame, chunks[0], app);
    render_status(frame, chunks[1], app);
    render_note(frame, chunks[2], app);
    render_level_meter(frame, chunks[3], app);
    render_stability(frame, chunks[4], app);
    render_mapping(frame, chunks[5], app);
    render_help(frame, chunks[6]);
}

/// Render title bar
fn render_title(frame: &mut Frame, area: Rect, app: &App) {
    let state = if app.running { "RUNNING" } else { "STOPPED" };
    let title = Paragraph::new(format!("Stylomidi - {} mode - {}", app.mode.label(), state))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(title, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let mut text = app.status.clone();
    if app.overflows > 0 {
        text.push_str(&format!("  ({} overflows)", app.overflows));
    }

    let paragraph = Paragraph::new(text).block(Block::default().title("Status").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

/// Render current note and what it was turned into
fn render_note(frame: &mut Frame, area: Rect, app: &App) {
    let note_style = if app.note.is_some() {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let lines = vec![
        Line::from(vec![Span::raw("Note: "), Span::styled(app.note_label(), note_style)]),
        Line::from(format!("Output: {}", app.delivery_label())),
        Line::from(format!("Pitch: {:.1} Hz", app.frequency)),
    ];

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title("Current Note").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

/// Render input level in dB
fn render_level_meter(frame: &mut Frame, area: Rect, app: &App) {
    let db = app.level_db();
    let ratio = ((db - METER_FLOOR_DB) / -METER_FLOOR_DB).clamp(0.0, 1.0);
    let floor = app.parameters.snapshot().silence_amplitude_floor;
    let color = if app.amplitude < floor { Color::DarkGray } else { Color::Green };

    let gauge = Gauge::default()
        .block(Block::default().title("Input Level").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .label(format!("{:.1} dB", db))
        .ratio(ratio as f64);

    frame.render_widget(gauge, area);
}

/// Render required agreement against the window size
fn render_stability(frame: &mut Frame, area: Rect, app: &App) {
    let required = app.required_agreement();
    let window = app.window_capacity().max(1);

    let gauge = Gauge::default()
        .block(Block::default().title("Stability").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .label(format!("{} of last {} blocks", required, window))
        .ratio((required as f64 / window as f64).clamp(0.0, 1.0));

    frame.render_widget(gauge, area);
}

/// Render the key mapping table in keyboard mode
fn render_mapping(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(format!("Key Mapping ({})", app.mapping_label()))
        .borders(Borders::ALL);

    let lines: Vec<Line> = match app.mode {
        OutputMode::Midi => vec![Line::from(Span::styled(
            "MIDI mode: every stable note is sent as note on/off",
            Style::default().fg(Color::Gray),
        ))],
        OutputMode::Keys if app.mapping_rows.is_empty() => vec![Line::from("No mapping loaded")],
        OutputMode::Keys => {
            let mut lines = vec![Line::from(Span::styled(
                format!("{:<14}{}", "MIDI Note", "Key"),
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            lines.extend(app.mapping_rows.iter().map(|(note, key)| {
                let label = format!("{} ({})", note, crate::types::note::note_name(*note));
                let style = if app.note == Some(*note) {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                Line::from(Span::styled(format!("{:<14}{}", label, key), style))
            }));
            lines
        }
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Render help text
fn render_help(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from("Controls:"),
        Line::from("  Space: Start/Stop  |  ↑/↓: Stability  |  M: Mode  |  N: Next mapping  |  R: Rescan  |  Q/Esc: Quit"),
    ];

    let paragraph = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray));

    frame.render_widget(paragraph, area);
}
