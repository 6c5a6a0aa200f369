//! Panel 4: keyboard shortcuts.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::AppState;
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let mut lines: Vec<Line> = Vec::new();

    section(&mut lines, "Global");
    key(&mut lines, "1-4", "Switch to panel by number");
    key(&mut lines, "Tab / Shift+Tab", "Cycle panels forward / back");
    key(&mut lines, "r", "Request a distribution with the current settings");
    key(&mut lines, "e", "Open error history");
    key(&mut lines, "q", "Quit (settings are saved)");
    lines.push(Line::from(""));

    section(&mut lines, "Panel 1: Settings");
    key(&mut lines, "j / k", "Move between fields");
    key(&mut lines, "Enter / Space", "Edit field, or toggle volume and minimum policy");
    key(&mut lines, "Enter (editing)", "Apply the typed value");
    key(&mut lines, "Esc (editing)", "Discard the edit");
    key(&mut lines, "d", "Reset field to its default");
    lines.push(Line::from(""));

    section(&mut lines, "Panel 2: Results");
    key(&mut lines, "j / k", "Scroll rows");
    key(&mut lines, "PgUp / PgDn", "Scroll a page");
    key(&mut lines, "g / G", "First / last row");
    lines.push(Line::from(""));

    section(&mut lines, "Panel 3: Charts");
    key(&mut lines, "", "Shipped quantity per product and the top five branches");
    lines.push(Line::from(""));

    section(&mut lines, "Server");
    key(&mut lines, "API", &app.settings.api_url);
    key(&mut lines, "", "Start it with `hubflow serve`");

    f.render_widget(Paragraph::new(lines), area);
}

fn section(lines: &mut Vec<Line<'_>>, title: &str) {
    lines.push(Line::from(Span::styled(title.to_string(), theme::accent_bold())));
}

fn key(lines: &mut Vec<Line<'_>>, keys: &str, desc: &str) {
    lines.push(Line::from(vec![
        Span::styled(format!("  {:>20}  ", keys), theme::accent()),
        Span::styled(desc.to_string(), theme::muted()),
    ]));
}
