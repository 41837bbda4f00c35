//! Status bar: bottom line with mode, active filters and keybindings.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_ACCENT, C_FILTER_FG, C_MUTED, C_SECONDARY, C_SEPARATOR};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Search,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "GUIDE",
            Self::Search => "SEARCH",
        }
    }

    pub fn color(self) -> ratatui::style::Color {
        match self {
            Self::Normal => C_SECONDARY,
            Self::Search => C_FILTER_FG,
        }
    }
}

/// What the status bar reports about the guide.
pub struct StatusInfo<'a> {
    pub mode: InputMode,
    pub anchor: String,
    pub group: String,
    pub source: Option<&'a str>,
    pub visible: usize,
    pub total: usize,
    pub loading: bool,
}

pub fn draw_status_bar(frame: &mut Frame, area: Rect, info: &StatusInfo<'_>) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", info.mode.label()),
            Style::default()
                .fg(info.mode.color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(info.anchor.clone(), Style::default().fg(C_SECONDARY)),
        Span::styled("  ", Style::default()),
        Span::styled(
            format!("{} · {}/{}", info.group, info.visible, info.total),
            Style::default().fg(C_SECONDARY),
        ),
    ];
    if let Some(source) = info.source {
        spans.push(Span::styled(
            format!(" · {}", source),
            Style::default().fg(C_SECONDARY),
        ));
    }
    if info.loading {
        spans.push(Span::styled(" ●", Style::default().fg(C_ACCENT)));
    }

    let keys = match info.mode {
        InputMode::Normal => {
            "  jk rows  hl time  n now  [] day  T today  +- zoom  / search  g group  s source  t scope  f fav  Enter play  ? help  q quit"
        }
        InputMode::Search => "  type to search  Enter keep  Esc clear+close",
    };
    spans.push(Span::styled(keys, Style::default().fg(C_MUTED)));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Horizontal separator line.
pub fn draw_separator(frame: &mut Frame, area: Rect) {
    let line = Line::from(Span::styled(
        "─".repeat(area.width as usize),
        Style::default().fg(C_SEPARATOR),
    ));
    frame.render_widget(Paragraph::new(line), area);
}
