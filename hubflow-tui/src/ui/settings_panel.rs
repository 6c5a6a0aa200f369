//! Panel 1: request settings, one field per row.

use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{AppState, SettingsField};
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let panel = &app.settings_panel;
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(vec![
        Span::styled("Request settings  ", theme::accent_bold()),
        Span::styled("[j/k]move [Enter]edit [d]efault [r]un", theme::muted()),
    ]));
    lines.push(Line::from(""));

    for (i, field) in SettingsField::all().into_iter().enumerate() {
        if field == SettingsField::Schema {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Source tables", theme::accent_bold())));
        }

        let is_cursor = i == panel.cursor;
        let marker = if is_cursor { "> " } else { "  " };
        let label_style = if is_cursor {
            theme::accent().add_modifier(Modifier::REVERSED)
        } else {
            theme::muted()
        };

        let mut spans = vec![
            Span::styled(marker, theme::accent()),
            Span::styled(format!("{:<22}", field.label()), label_style),
            Span::raw(" "),
        ];
        match (&panel.editing, is_cursor) {
            (Some(buffer), true) => {
                spans.push(Span::styled(buffer.clone(), theme::accent_bold()));
                spans.push(Span::styled("_", theme::accent()));
            }
            _ => {
                let value = app.settings.value(field);
                if value.is_empty() {
                    spans.push(Span::styled(placeholder(field), theme::muted()));
                } else {
                    spans.push(Span::styled(value, theme::neutral()));
                }
            }
        }
        lines.push(Line::from(spans));
    }

    // Keep the cursor row on screen on short terminals.
    let cursor_line = panel.cursor as u16 + 2 + if panel.field().is_table_group() { 2 } else { 0 };
    let scroll = cursor_line.saturating_sub(area.height.saturating_sub(1));
    f.render_widget(Paragraph::new(lines).scroll((scroll, 0)), area);
}

fn placeholder(field: SettingsField) -> &'static str {
    match field {
        SettingsField::RunDate => "(today)",
        SettingsField::MinDemand => "(none)",
        _ => "",
    }
}
