//! Search bar over the guide: a tui-input line that feeds the filter query.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{C_FILTER_BG, C_FILTER_FG, C_MUTED, C_SECONDARY};

#[derive(Debug, PartialEq)]
pub enum SearchAction {
    Changed(String),
    Confirmed,
    Cancelled,
    None,
}

pub struct SearchInput {
    input: Input,
    active: bool,
    placeholder: String,
}

impl SearchInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            active: false,
            placeholder: placeholder.into(),
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Esc clears the text first; a second Esc on an empty bar closes it.
    pub fn handle_key(&mut self, key: KeyEvent) -> SearchAction {
        match key.code {
            KeyCode::Esc if !self.input.value().is_empty() => {
                self.input = Input::default();
                SearchAction::Changed(String::new())
            }
            KeyCode::Esc => {
                self.active = false;
                SearchAction::Cancelled
            }
            KeyCode::Enter => {
                self.active = false;
                SearchAction::Confirmed
            }
            _ => {
                let before = self.input.value().to_string();
                self.input.handle_event(&Event::Key(key));
                if self.input.value() == before {
                    SearchAction::None
                } else {
                    SearchAction::Changed(self.input.value().to_string())
                }
            }
        }
    }

    /// `scope` is shown right-aligned so the user knows whether titles count.
    pub fn draw(&self, frame: &mut Frame, area: Rect, scope: &str) {
        let scroll = self
            .input
            .visual_scroll(area.width.saturating_sub(4) as usize);
        let value = self.input.value();
        let text = if value.is_empty() {
            Span::styled(format!("/ {}", self.placeholder), Style::default().fg(C_MUTED))
        } else {
            let visible: String = value.chars().skip(scroll).collect();
            Span::styled(format!("/ {}", visible), Style::default().fg(C_FILTER_FG))
        };
        let scope_span = Span::styled(format!("[{}] ", scope), Style::default().fg(C_SECONDARY));

        frame.render_widget(
            Paragraph::new(Line::from(text)).style(Style::default().bg(C_FILTER_BG)),
            area,
        );
        let scope_w = scope_span.width() as u16;
        if area.width > scope_w + 8 {
            let scope_area = Rect {
                x: area.x + area.width - scope_w,
                width: scope_w,
                ..area
            };
            frame.render_widget(Paragraph::new(Line::from(scope_span)), scope_area);
        }

        if self.active {
            let cursor_x = area.x + 2 + self.input.visual_cursor().saturating_sub(scroll) as u16;
            frame.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(1)), area.y));
        }
    }
}
