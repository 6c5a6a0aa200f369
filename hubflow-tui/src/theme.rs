//! Dashboard colour tokens.
//!
//! Neon accents for a dark terminal:
//! - **Accent**: electric cyan (focus, highlights)
//! - **Positive**: neon green (full allocations, success)
//! - **Negative**: hot pink (errors, starved branches)
//! - **Warning**: neon orange (partial fills, alerts)
//! - **Neutral**: cool purple (secondary info)
//! - **Muted**: steel blue (labels, disabled)

use ratatui::style::{Color, Modifier, Style};

pub const ACCENT: Color = Color::Rgb(0, 255, 255);
pub const POSITIVE: Color = Color::Rgb(0, 255, 128);
pub const NEGATIVE: Color = Color::Rgb(255, 20, 147);
pub const WARNING: Color = Color::Rgb(255, 140, 0);
pub const NEUTRAL: Color = Color::Rgb(147, 112, 219);
pub const MUTED: Color = Color::Rgb(100, 149, 237);

/// Palette handed to widgets that take colours rather than styles.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub accent: Color,
    pub positive: Color,
    pub negative: Color,
    pub warning: Color,
    pub muted: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: ACCENT,
            positive: POSITIVE,
            negative: NEGATIVE,
            warning: WARNING,
            muted: MUTED,
        }
    }
}

impl Theme {
    /// Colour for how much of a branch's demand was shipped.
    pub fn fill_color(&self, qty: f64, demand: f64) -> Color {
        if demand <= 0.0 {
            return self.muted;
        }
        match qty / demand {
            r if r >= 0.999 => self.positive,
            r if r >= 0.5 => self.accent,
            r if r > 0.0 => self.warning,
            _ => self.negative,
        }
    }
}

pub fn accent() -> Style {
    Style::default().fg(ACCENT)
}

pub fn accent_bold() -> Style {
    accent().add_modifier(Modifier::BOLD)
}

pub fn negative() -> Style {
    Style::default().fg(NEGATIVE)
}

pub fn warning() -> Style {
    Style::default().fg(WARNING)
}

pub fn neutral() -> Style {
    Style::default().fg(NEUTRAL)
}

pub fn muted() -> Style {
    Style::default().fg(MUTED)
}

pub fn panel_border(active: bool) -> Style {
    if active { accent() } else { muted() }
}

pub fn panel_title(active: bool) -> Style {
    if active { accent_bold() } else { muted() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_palette() {
        let theme = Theme::default();
        assert_eq!(theme.accent, Color::Rgb(0, 255, 255));
        assert_eq!(theme.negative, NEGATIVE);
    }

    #[test]
    fn fill_color_grades() {
        let theme = Theme::default();
        assert_eq!(theme.fill_color(10.0, 10.0), theme.positive);
        assert_eq!(theme.fill_color(6.0, 10.0), theme.accent);
        assert_eq!(theme.fill_color(1.0, 10.0), theme.warning);
        assert_eq!(theme.fill_color(0.0, 10.0), theme.negative);
        assert_eq!(theme.fill_color(0.0, 0.0), theme.muted);
    }
}
