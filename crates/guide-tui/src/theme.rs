//! Guide palette. Grid cells, chrome and toasts share a handful of roles.

use ratatui::style::{Color, Modifier, Style};

// Chrome
pub const C_BG: Color = Color::Rgb(18, 18, 18);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_MUTED: Color = Color::Rgb(72, 72, 88);
pub const C_SEPARATOR: Color = Color::Rgb(40, 40, 52);
pub const C_ACCENT: Color = Color::Rgb(255, 95, 95);
pub const C_FILTER_BG: Color = Color::Rgb(20, 20, 32);
pub const C_FILTER_FG: Color = Color::Rgb(255, 200, 80);

// Grid
pub const C_SELECTION_BG: Color = Color::Rgb(28, 28, 40);
pub const C_LIVE: Color = Color::Rgb(80, 200, 120);
pub const C_LIVE_BG: Color = Color::Rgb(22, 44, 32);
pub const C_NOW_LINE: Color = C_ACCENT;
pub const C_REMINDER: Color = Color::Rgb(180, 120, 220);
pub const C_CHNO: Color = Color::Rgb(90, 90, 115);
pub const C_STARS: Color = Color::Rgb(255, 210, 50);

// Toasts reuse the grid roles for success and error.
pub const C_TOAST_INFO: Color = Color::Rgb(80, 160, 220);
pub const C_TOAST_WARNING: Color = Color::Rgb(255, 184, 80);

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

/// Programs that already ended.
pub fn style_muted() -> Style {
    Style::default().fg(C_MUTED)
}

pub fn style_live() -> Style {
    Style::default()
        .fg(C_LIVE)
        .bg(C_LIVE_BG)
        .add_modifier(Modifier::BOLD)
}

pub fn style_selected() -> Style {
    style_default().bg(C_SELECTION_BG).add_modifier(Modifier::BOLD)
}

pub fn style_border() -> Style {
    Style::default().fg(C_SEPARATOR)
}
