//! Top-level UI layout: one panel at a time plus a status bar.

pub mod chart_panel;
pub mod help_panel;
pub mod overlays;
pub mod results_panel;
pub mod settings_panel;
pub mod status_bar;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

use crate::app::{AppState, Overlay, Panel};
use crate::theme;

/// Draw the entire UI.
pub fn draw(f: &mut Frame, app: &AppState) {
    // Split: main area + 1-line status bar.
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    let main_area = chunks[0];
    let status_area = chunks[1];

    draw_panel(f, main_area, app);
    status_bar::render(f, status_area, app);

    if app.overlay == Overlay::ErrorHistory {
        overlays::render_error_history(f, main_area, app);
    }
}

fn draw_panel(f: &mut Frame, area: Rect, app: &AppState) {
    let panel = app.active_panel;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(true))
        .title(format!(" {} [{}] ", panel.label(), panel.index() + 1))
        .title_style(theme::panel_title(true));

    let inner = block.inner(area);
    f.render_widget(block, area);

    match panel {
        Panel::Settings => settings_panel::render(f, inner, app),
        Panel::Results => results_panel::render(f, inner, app),
        Panel::Charts => chart_panel::render(f, inner, app),
        Panel::Help => help_panel::render(f, inner, app),
    }
}

/// Compute a centered rect for overlays.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// First 8 hex digits of a UUID, enough to tell rows apart on screen.
pub fn short_id(id: impl std::fmt::Display) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::sync::mpsc;

    use hubflow_core::domain::{AllocationRow, BranchId, ProductId};

    fn app_with_rows() -> AppState {
        let (tx, _rx) = mpsc::channel();
        let (_resp_tx, resp_rx) = mpsc::channel();
        let mut app = AppState::new(tx, resp_rx);
        app.results.rows = (1..=12)
            .map(|i| AllocationRow {
                branch_id: BranchId::from_u128(i % 4),
                product_id: ProductId::from_u128(i % 3),
                demand: 10.0,
                available: 25.0,
                qty: i as f64,
            })
            .collect();
        app.push_error("boom".into(), "GET /distribution".into());
        app
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn every_panel_renders() {
        let mut app = app_with_rows();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        for i in 0..Panel::COUNT {
            app.active_panel = Panel::from_index(i).unwrap();
            terminal.draw(|f| draw(f, &app)).unwrap();
            assert!(buffer_text(&terminal).contains(app.active_panel.label()));
        }
        app.overlay = Overlay::ErrorHistory;
        terminal.draw(|f| draw(f, &app)).unwrap();
        assert!(buffer_text(&terminal).contains("boom"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let mut app = app_with_rows();
        let mut terminal = Terminal::new(TestBackend::new(12, 4)).unwrap();
        for i in 0..Panel::COUNT {
            app.active_panel = Panel::from_index(i).unwrap();
            terminal.draw(|f| draw(f, &app)).unwrap();
        }
    }

    #[test]
    fn short_id_truncates() {
        assert_eq!(short_id(BranchId::from_u128(1)), "00000000");
    }
}
