//! Panel 2: allocation rows as returned by `/distribution`.

use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::AppState;
use crate::theme::{self, Theme};
use crate::ui::short_id;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let r = &app.results;
    let palette = Theme::default();
    let mut lines: Vec<Line> = Vec::new();

    let run_info = match &r.last_run {
        Some(run) => format!(
            "run date {} | fetched {} in {} ms | ",
            run.params
                .run_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "today".into()),
            run.fetched_at.format("%H:%M:%S"),
            run.elapsed_ms
        ),
        None => String::new(),
    };
    lines.push(Line::from(vec![
        Span::styled(run_info, theme::muted()),
        Span::styled(
            format!("{} rows, {:.2} units", r.rows.len(), r.total_qty()),
            theme::accent(),
        ),
        Span::styled("  [j/k]scroll [g/G]ends", theme::muted()),
    ]));
    lines.push(Line::from(""));

    if r.rows.is_empty() {
        lines.push(Line::from(Span::styled(
            "No allocation yet. Press r to request one with the current settings.",
            theme::muted(),
        )));
        f.render_widget(Paragraph::new(lines), area);
        return;
    }

    lines.push(Line::from(Span::styled(
        format!(
            "{:>4} {:>10} {:>10} {:>12} {:>12} {:>12}",
            "#", "Branch", "Product", "Demand", "Available", "Qty"
        ),
        theme::accent_bold(),
    )));

    let visible = area.height.saturating_sub(3) as usize;
    let start = if visible > 0 && r.cursor >= r.scroll_offset + visible {
        r.cursor + 1 - visible
    } else {
        r.scroll_offset.min(r.cursor)
    };

    for (i, row) in r.rows.iter().enumerate().skip(start).take(visible) {
        let is_cursor = i == r.cursor;
        let base = if is_cursor {
            theme::accent().add_modifier(Modifier::REVERSED)
        } else {
            theme::muted()
        };
        let qty_style = if is_cursor {
            base
        } else {
            Style::default().fg(palette.fill_color(row.qty, row.demand))
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!(
                    "{:>4} {:>10} {:>10} {:>12.2} {:>12.2}",
                    i + 1,
                    short_id(row.branch_id),
                    short_id(row.product_id),
                    row.demand,
                    row.available
                ),
                base,
            ),
            Span::styled(format!(" {:>12.2}", row.qty), qty_style),
        ]));
    }

    f.render_widget(Paragraph::new(lines), area);
}
