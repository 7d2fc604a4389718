use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use super::app::App;

/// Handle keyboard events and update app state
pub fn handle_events(app: &mut App) -> anyhow::Result<()> {
    // Poll for events with timeout
    if event::poll(Duration::from_millis(50))? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                handle_key_event(app, key);
            }
        }
    }
    Ok(())
}

/// Process individual key press
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Check for Ctrl+C
    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
        app.quit();
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.quit();
        }

        // Start/stop processing
        KeyCode::Char(' ') | KeyCode::Enter => {
            app.toggle_running();
        }

        // Adjust stability (vim-style: k=up, j=down)
        KeyCode::Char('k') | KeyCode::Up | KeyCode::Char('+') => {
            app.increase_stability();
        }
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('-') => {
            app.decrease_stability();
        }

        KeyCode::Char('m') => {
            app.toggle_mode();
        }

        // Mapping files
        KeyCode::Char('n') => {
            app.next_mapping();
        }
        KeyCode::Char('r') => {
            app.refresh_mappings();
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputMode;
    use crate::keys::mapping::MappingCatalog;
    use crate::stability::parameters::StabilityParameters;
    use crate::ui::app::Request;
    use std::sync::Arc;

    fn press(app: &mut App, code: KeyCode) {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn app() -> App {
        App::new(Arc::new(StabilityParameters::default()), OutputMode::Midi, MappingCatalog::default())
    }

    #[test]
    fn test_space_requests_start() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.take_request(), Some(Request::Start));
    }

    #[test]
    fn test_arrows_adjust_stability() {
        let mut app = app();
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.required_agreement(), 6);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut app = app();
        handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_m_toggles_mode() {
        let mut app = app();
        press(&mut app, KeyCode::Char('m'));
        assert_eq!(app.mode, OutputMode::Keys);
    }
}
