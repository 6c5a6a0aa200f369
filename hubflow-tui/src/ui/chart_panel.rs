//! Panel 3: shipped quantity per product and the busiest branches.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::AppState;
use crate::theme;
use crate::ui::short_id;

const TOP_BRANCHES: usize = 5;
const MAX_PRODUCTS: usize = 12;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    if app.results.rows.is_empty() {
        render_empty(f, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let mut products = app.results.qty_by_product();
    let hidden = products.len().saturating_sub(MAX_PRODUCTS);
    products.truncate(MAX_PRODUCTS);
    let title = if hidden > 0 {
        format!(" Qty by product (+{hidden} more) ")
    } else {
        " Qty by product ".to_string()
    };
    render_bars(
        f,
        chunks[0],
        &title,
        products.into_iter().map(|(id, q)| (short_id(id), q)),
        theme::ACCENT,
    );

    render_bars(
        f,
        chunks[1],
        &format!(" Top {TOP_BRANCHES} branches "),
        app.results
            .top_branches(TOP_BRANCHES)
            .into_iter()
            .map(|(id, q)| (short_id(id), q)),
        theme::POSITIVE,
    );
}

fn render_empty(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Nothing to chart yet.",
            theme::muted(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press r to fetch a distribution, then come back here.",
            theme::muted(),
        )),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

fn render_bars(
    f: &mut Frame,
    area: Rect,
    title: &str,
    data: impl Iterator<Item = (String, f64)>,
    color: ratatui::style::Color,
) {
    let bars: Vec<Bar> = data
        .map(|(label, qty)| {
            Bar::default()
                .label(Line::from(label))
                .value(qty.round().max(0.0) as u64)
                .text_value(format!("{qty:.1}"))
                .style(Style::default().fg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::TOP)
                .title(Span::styled(title.to_string(), theme::muted())),
        )
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .value_style(theme::accent_bold())
        .label_style(theme::muted())
        .data(BarGroup::default().bars(&bars));

    f.render_widget(chart, area);
}
