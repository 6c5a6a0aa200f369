//! Keyboard input dispatch: field editing → overlays → global keys → panel keys.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::app::{AppState, Overlay, Panel, SettingsField};

/// Rows moved by PageUp/PageDown in the results table.
const PAGE: isize = 20;

pub fn handle_key(app: &mut AppState, key: KeyEvent) {
    // Only handle key press events (Windows sends both Press and Release).
    if key.kind != KeyEventKind::Press {
        return;
    }

    // 1. A field being edited swallows everything, including 'q' and digits.
    if app.settings_panel.editing.is_some() {
        handle_edit_key(app, key);
        return;
    }

    // 2. Overlays.
    if app.overlay == Overlay::ErrorHistory {
        handle_error_overlay(app, key);
        return;
    }

    // 3. Global keys.
    match key.code {
        KeyCode::Char('q') => {
            app.running = false;
            return;
        }
        KeyCode::Char(c @ '1'..='4') => {
            if let Some(panel) = c.to_digit(10).and_then(|d| Panel::from_index(d as usize - 1)) {
                app.active_panel = panel;
            }
            return;
        }
        KeyCode::Tab => {
            app.active_panel = app.active_panel.next();
            return;
        }
        KeyCode::BackTab => {
            app.active_panel = app.active_panel.prev();
            return;
        }
        KeyCode::Char('r') => {
            app.request_distribution();
            return;
        }
        KeyCode::Char('e') => {
            app.overlay = Overlay::ErrorHistory;
            app.error_scroll = 0;
            return;
        }
        _ => {}
    }

    // 4. Panel-specific keys.
    match app.active_panel {
        Panel::Settings => handle_settings_key(app, key),
        Panel::Results => handle_results_key(app, key),
        Panel::Charts | Panel::Help => {}
    }
}

fn handle_error_overlay(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('e') => {
            app.overlay = Overlay::None;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if app.error_scroll + 1 < app.error_history.len() {
                app.error_scroll += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.error_scroll = app.error_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

fn handle_settings_key(app: &mut AppState, key: KeyEvent) {
    let count = SettingsField::all().len();
    let panel = &mut app.settings_panel;
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            if panel.cursor + 1 < count {
                panel.cursor += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            panel.cursor = panel.cursor.saturating_sub(1);
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            let field = panel.field();
            if field.is_toggle() {
                app.settings.toggle(field);
                let value = app.settings.value(field);
                app.set_status(format!("{}: {value}", field.label()));
            } else {
                panel.editing = Some(app.settings.value(field));
            }
        }
        KeyCode::Char('d') => {
            let field = panel.field();
            app.settings.reset(field);
            app.set_status(format!("{} reset", field.label()));
        }
        _ => {}
    }
}

fn handle_edit_key(app: &mut AppState, key: KeyEvent) {
    let Some(buffer) = app.settings_panel.editing.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => {
            app.settings_panel.editing = None;
        }
        KeyCode::Enter => {
            let input = std::mem::take(buffer);
            let field = app.settings_panel.field();
            match app.settings.set(field, &input) {
                Ok(()) => {
                    app.settings_panel.editing = None;
                    app.set_status(format!("{} updated", field.label()));
                }
                // Keep the buffer so the typo can be fixed
                Err(e) => {
                    app.settings_panel.editing = Some(input);
                    app.set_warning(e);
                }
            }
        }
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Char(c) => {
            buffer.push(c);
        }
        _ => {}
    }
}

fn handle_results_key(app: &mut AppState, key: KeyEvent) {
    let results = &mut app.results;
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => results.move_cursor(1, 0),
        KeyCode::Char('k') | KeyCode::Up => results.move_cursor(-1, 0),
        KeyCode::PageDown => results.move_cursor(PAGE, 0),
        KeyCode::PageUp => results.move_cursor(-PAGE, 0),
        KeyCode::Char('g') | KeyCode::Home => results.move_cursor(isize::MIN / 2, 0),
        KeyCode::Char('G') | KeyCode::End => results.move_cursor(isize::MAX / 2, 0),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use std::sync::mpsc;

    use crate::worker::WorkerCommand;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> (AppState, mpsc::Receiver<WorkerCommand>) {
        let (tx, rx) = mpsc::channel();
        let (_resp_tx, resp_rx) = mpsc::channel();
        (AppState::new(tx, resp_rx), rx)
    }

    fn type_text(app: &mut AppState, text: &str) {
        for c in text.chars() {
            handle_key(app, press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn digits_and_tab_switch_panels() {
        let (mut app, _rx) = app();
        handle_key(&mut app, press(KeyCode::Char('3')));
        assert_eq!(app.active_panel, Panel::Charts);
        handle_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.active_panel, Panel::Help);
        handle_key(&mut app, press(KeyCode::BackTab));
        assert_eq!(app.active_panel, Panel::Charts);
    }

    #[test]
    fn release_events_are_ignored() {
        let (mut app, _rx) = app();
        let mut key = press(KeyCode::Char('q'));
        key.kind = KeyEventKind::Release;
        handle_key(&mut app, key);
        assert!(app.running);
    }

    #[test]
    fn editing_swallows_global_keys() {
        let (mut app, _rx) = app();
        // Cursor starts on the API URL
        handle_key(&mut app, press(KeyCode::Enter));
        assert!(app.settings_panel.editing.is_some());
        app.settings_panel.editing = Some(String::new());
        type_text(&mut app, "http://q1:8000");
        assert!(app.running);
        assert_eq!(app.active_panel, Panel::Settings);
        handle_key(&mut app, press(KeyCode::Enter));
        assert!(app.settings_panel.editing.is_none());
        assert_eq!(app.settings.api_url, "http://q1:8000");
    }

    #[test]
    fn invalid_edit_keeps_buffer() {
        let (mut app, _rx) = app();
        let limit_row = SettingsField::all()
            .iter()
            .position(|&f| f == SettingsField::Limit)
            .unwrap();
        app.settings_panel.cursor = limit_row;
        handle_key(&mut app, press(KeyCode::Enter));
        type_text(&mut app, "x");
        handle_key(&mut app, press(KeyCode::Enter));
        assert_eq!(app.settings_panel.editing.as_deref(), Some("100x"));
        assert_eq!(app.settings.limit, 100);

        handle_key(&mut app, press(KeyCode::Esc));
        assert!(app.settings_panel.editing.is_none());
    }

    #[test]
    fn enter_toggles_volume() {
        let (mut app, _rx) = app();
        app.settings_panel.cursor = SettingsField::all()
            .iter()
            .position(|&f| f == SettingsField::RespectVolume)
            .unwrap();
        handle_key(&mut app, press(KeyCode::Enter));
        assert!(app.settings.respect_volume);
        assert!(app.settings_panel.editing.is_none());
    }

    #[test]
    fn r_sends_fetch() {
        let (mut app, rx) = app();
        handle_key(&mut app, press(KeyCode::Char('r')));
        assert!(matches!(
            rx.try_recv(),
            Ok(WorkerCommand::FetchDistribution { .. })
        ));
    }

    #[test]
    fn error_overlay_opens_and_closes() {
        let (mut app, _rx) = app();
        handle_key(&mut app, press(KeyCode::Char('e')));
        assert_eq!(app.overlay, Overlay::ErrorHistory);
        handle_key(&mut app, press(KeyCode::Char('q')));
        assert_eq!(app.overlay, Overlay::None);
        assert!(app.running);
    }
}
