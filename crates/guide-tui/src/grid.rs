//! Guide grid: draws the materialized row descriptors as a channel column
//! plus a horizontally scrolled strip of program cells.
//!
//! One timeline pixel is one terminal column and one virtualizer unit is one
//! terminal line, so the core's geometry is used as-is.
//!
//! ```text
//!  ┌ channel col ┐┌──────────── time ruler ───────────────┐
//!  ★ 101 BBC One  ▏News at Six   ▏The One Show  ▏EastEnders
//!                 ▏18:00         ━━━━━━━━──────  ▏19:30
//! ```

use chrono::{DateTime, Duration, Local, Timelike, Utc};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::Style,
    text::Line,
    widgets::Paragraph,
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use guide_core::rows::{Airing, ProgramCell, RowDescriptor};
use guide_core::GuideState;

use crate::theme::{
    style_default, style_live, style_muted, style_secondary, style_selected, C_CHNO, C_LIVE,
    C_NOW_LINE, C_REMINDER, C_STARS,
};

/// Candidate ruler steps in minutes, finest first.
const RULER_STEPS: &[i64] = &[15, 30, 60, 120, 180, 360, 720, 1440];
/// Columns a ruler label needs, including a gap.
const RULER_LABEL_COLS: f64 = 8.0;

/// Screen geometry of the grid, shared with the event loop so resize and
/// mouse handling use the same numbers the draw used.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridLayout {
    pub ruler: Rect,
    pub body: Rect,
    pub channel_col: u16,
}

impl GridLayout {
    pub fn new(area: Rect, channel_col: u16) -> Self {
        let channel_col = channel_col.min(area.width / 2);
        let ruler = Rect {
            height: area.height.min(1),
            ..area
        };
        let body = Rect {
            y: area.y + ruler.height,
            height: area.height.saturating_sub(ruler.height),
            ..area
        };
        Self {
            ruler,
            body,
            channel_col,
        }
    }

    /// Width of the program strip, in timeline pixels.
    pub fn viewport_width(&self) -> f64 {
        f64::from(self.body.width.saturating_sub(self.channel_col))
    }

    pub fn viewport_height(&self) -> f64 {
        f64::from(self.body.height)
    }

    fn strip_x(&self) -> u16 {
        self.body.x + self.channel_col
    }

    /// Row index under a screen line, if that line is inside the body.
    pub fn row_at(&self, state: &GuideState, screen_y: u16) -> Option<usize> {
        if screen_y < self.body.y || screen_y >= self.body.y + self.body.height {
            return None;
        }
        let virt = state.virtualizer();
        let y = virt.scroll_top() + f64::from(screen_y - self.body.y);
        let index = (y / virt.row_height()).floor();
        (index >= 0.0 && (index as usize) < virt.len()).then_some(index as usize)
    }
}

/// Visible column span of `[x, x + width)` once scrolled by `scroll_left`
/// and clipped to the strip. Returns `(column, width, starts_in_view)`.
pub fn clip_span(x: f64, width: f64, scroll_left: f64, viewport_width: f64) -> Option<(u16, u16, bool)> {
    let left = x - scroll_left;
    let right = left + width;
    let from = left.max(0.0).round();
    let to = right.min(viewport_width).round();
    if to <= from {
        return None;
    }
    Some((from as u16, (to - from) as u16, left >= 0.0))
}

/// Cut `text` to at most `max_cols` display columns, ending in `…` when cut.
pub fn truncate_to_width(text: &str, max_cols: usize) -> String {
    if text.width() <= max_cols {
        return text.to_string();
    }
    if max_cols == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max_cols {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Smallest ruler step whose labels do not collide at this scale.
pub fn ruler_step_minutes(hour_width: f64) -> i64 {
    RULER_STEPS
        .iter()
        .copied()
        .find(|&m| m as f64 / 60.0 * hour_width >= RULER_LABEL_COLS)
        .unwrap_or(1440)
}

fn local_hm(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%H:%M").to_string()
}

/// `loading` is true while any fetch the empty state may be waiting on runs.
pub fn draw_grid(
    frame: &mut Frame,
    layout: &GridLayout,
    state: &GuideState,
    selected: Option<usize>,
    loading: bool,
) {
    if let Some(message) = empty_message(state, loading) {
        draw_empty(frame, layout.body, &message);
        return;
    }
    let buf = frame.buffer_mut();
    draw_ruler(buf, layout, state);

    let virt = state.virtualizer();
    let row_lines = virt.row_height().round().max(1.0) as i64;
    let scroll_top = virt.scroll_top().round() as i64;
    let body_h = i64::from(layout.body.height);

    for row in state.rows() {
        let top = row.top.round() as i64 - scroll_top;
        for line in 0..row_lines {
            let y = top + line;
            if y < 0 || y >= body_h {
                continue;
            }
            let screen_y = layout.body.y + y as u16;
            let is_selected = selected == Some(row.index);
            draw_channel_cell(buf, layout, row, line, screen_y, is_selected);
            for cell in &row.cells {
                draw_program_cell(buf, layout, state, cell, line, screen_y);
            }
        }
    }

    draw_now_line(buf, layout, state);
}

fn empty_message(state: &GuideState, loading: bool) -> Option<String> {
    state.empty_state()?;
    let query = &state.filter().query;
    Some(if !query.is_empty() {
        format!("No channels or programs match \"{}\"", query)
    } else if state.catalog().is_empty() && loading {
        "Loading guide…".to_string()
    } else if state.catalog().is_empty() {
        "No guide data. Check the [feed] source in config.toml".to_string()
    } else {
        format!("No channels in \"{}\"", state.filter().group)
    })
}

fn draw_empty(frame: &mut Frame, area: Rect, message: &str) {
    if area.height == 0 {
        return;
    }
    let mid = Rect {
        y: area.y + area.height / 2,
        height: 1,
        ..area
    };
    frame.render_widget(
        Paragraph::new(Line::from(message.to_string()))
            .style(style_secondary())
            .alignment(Alignment::Center),
        mid,
    );
}

fn draw_ruler(buf: &mut Buffer, layout: &GridLayout, state: &GuideState) {
    let area = layout.ruler;
    if area.height == 0 {
        return;
    }
    let mapper = state.mapper();
    let vw = layout.viewport_width();
    let (from, to) = mapper.visible_range(state.scroll_left(), vw);
    let step = ruler_step_minutes(mapper.hour_width());

    let label = mapper.anchor().to_string();
    buf.set_stringn(area.x, area.y, &label, layout.channel_col as usize, style_secondary());

    // First step boundary at or after `from`, aligned to the hour grid.
    let aligned = from
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(from);
    let mut t = aligned;
    while t < from {
        t += Duration::minutes(step);
    }
    while t < to {
        let x = mapper.time_to_x(t) - state.scroll_left();
        if x >= 0.0 && x < vw {
            let local = t.with_timezone(&Local);
            let text = if local.hour() == 0 && local.minute() == 0 {
                local.format("%a %d").to_string()
            } else {
                local_hm(t)
            };
            let col = layout.strip_x() + x.floor() as u16;
            let room = (vw - x.floor()).max(0.0) as usize;
            buf.set_stringn(col, area.y, format!("▏{}", text), room, style_muted());
        }
        t += Duration::minutes(step);
    }
}

fn draw_channel_cell(
    buf: &mut Buffer,
    layout: &GridLayout,
    row: &RowDescriptor,
    line: i64,
    y: u16,
    selected: bool,
) {
    let width = layout.channel_col as usize;
    if width == 0 {
        return;
    }
    let base = if selected { style_selected() } else { style_default() };
    buf.set_stringn(layout.body.x, y, " ".repeat(width), width, base);
    if line != 0 {
        return;
    }

    let mut x = layout.body.x;
    let star = if row.is_favorite { "★ " } else { "  " };
    buf.set_stringn(x, y, star, width, base.fg(C_STARS));
    x += 2;
    let mut room = width.saturating_sub(3);
    if let Some(chno) = &row.chno {
        let chno = format!("{} ", chno);
        let (next_x, _) = buf.set_stringn(x, y, &chno, room, base.fg(C_CHNO));
        room = room.saturating_sub(usize::from(next_x - x));
        x = next_x;
    }
    buf.set_stringn(x, y, truncate_to_width(&row.label, room), room, base);
}

fn draw_program_cell(
    buf: &mut Buffer,
    layout: &GridLayout,
    state: &GuideState,
    cell: &ProgramCell,
    line: i64,
    y: u16,
) {
    let Some((col, width, starts_in_view)) =
        clip_span(cell.x, cell.width, state.scroll_left(), layout.viewport_width())
    else {
        return;
    };
    let x = layout.strip_x() + col;
    let style = match cell.airing {
        Airing::Live => style_live(),
        Airing::Past => style_muted(),
        Airing::Upcoming => style_default(),
    };
    buf.set_stringn(x, y, " ".repeat(width as usize), width as usize, style);

    let (mut text_x, mut room) = (x, width as usize);
    if starts_in_view {
        buf.set_stringn(x, y, "▏", 1, Style::default().fg(C_CHNO));
        text_x += 1;
        room = room.saturating_sub(1);
    }
    if room == 0 {
        return;
    }

    if line == 0 {
        if cell.has_notification {
            buf.set_stringn(text_x, y, "◆", room, style.fg(C_REMINDER));
            text_x += 1;
            room = room.saturating_sub(1);
        }
        buf.set_stringn(text_x, y, truncate_to_width(&cell.title, room), room, style);
    } else if line == 1 && cell.airing == Airing::Live {
        let filled = (cell.progress * room as f64).round() as usize;
        let bar = format!("{}{}", "━".repeat(filled.min(room)), "─".repeat(room - filled.min(room)));
        buf.set_stringn(text_x, y, bar, room, Style::default().fg(C_LIVE));
    } else if line == 1 {
        buf.set_stringn(text_x, y, local_hm(cell.start), room, style_secondary());
    }
}

fn draw_now_line(buf: &mut Buffer, layout: &GridLayout, state: &GuideState) {
    let indicator = state.now_indicator();
    if !indicator.visible {
        return;
    }
    let x = indicator.x - state.scroll_left();
    if x < 0.0 || x >= layout.viewport_width() {
        return;
    }
    let col = layout.strip_x() + x.floor() as u16;
    if layout.ruler.height > 0 {
        buf.set_stringn(col, layout.ruler.y, "▼", 1, Style::default().fg(C_NOW_LINE));
    }
    for y in layout.body.y..layout.body.y + layout.body.height {
        if let Some(cell) = buf.cell_mut((col, y)) {
            if cell.symbol() == " " {
                cell.set_symbol("│");
            }
            cell.set_fg(C_NOW_LINE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use guide_core::collab::DayPayload;
    use guide_core::state::GuideOptions;
    use guide_proto::model::{Channel, DayKey, GuideSettings, Program};
    use ratatui::{backend::TestBackend, Terminal};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn guide() -> GuideState {
        let settings = GuideSettings {
            current_date: DayKey::of(fixed_now()),
            guide_duration_hours: 24,
            hour_width: 10.0,
            ..GuideSettings::default()
        };
        let mut state = GuideState::new(settings, GuideOptions::default()).with_clock(fixed_now);
        state.load_channels(vec![
            Channel {
                id: "one".into(),
                name: "One".into(),
                chno: Some("101".into()),
                ..Default::default()
            },
            Channel {
                id: "two".into(),
                name: "Two".into(),
                ..Default::default()
            },
        ]);
        let at = |h| Utc.with_ymd_and_hms(2024, 5, 20, h, 0, 0).unwrap();
        let mut payload = DayPayload::new();
        payload.insert(
            "one".into(),
            vec![Program {
                channel_id: String::new(),
                title: "Midday News".into(),
                description: String::new(),
                start: at(11),
                stop: at(14),
            }],
        );
        state.merge_day(DayKey::of(fixed_now()), payload);
        state.finalize(false).unwrap();
        state
    }

    fn render(state: &mut GuideState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        let layout = GridLayout::new(Rect::new(0, 0, 80, 12), 16);
        state.resize(layout.viewport_width(), layout.viewport_height());
        state.scroll_time_to(100.0);
        terminal
            .draw(|f| draw_grid(f, &layout, state, Some(0), false))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_clip_span() {
        assert_eq!(clip_span(100.0, 30.0, 90.0, 50.0), Some((10, 30, true)));
        assert_eq!(clip_span(80.0, 30.0, 90.0, 50.0), Some((0, 20, false)));
        assert_eq!(clip_span(130.0, 30.0, 90.0, 30.0), None);
        assert_eq!(clip_span(10.0, 30.0, 90.0, 50.0), None);
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("News", 10), "News");
        assert_eq!(truncate_to_width("Newsnight", 5), "News…");
        assert_eq!(truncate_to_width("日本語テレビ", 5), "日本…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn test_ruler_step_follows_scale() {
        assert_eq!(ruler_step_minutes(40.0), 15);
        assert_eq!(ruler_step_minutes(10.0), 60);
        assert_eq!(ruler_step_minutes(1.0), 720);
    }

    #[test]
    fn test_row_at_maps_lines_to_rows() {
        let mut state = guide();
        let layout = GridLayout::new(Rect::new(0, 0, 80, 12), 16);
        state.resize(layout.viewport_width(), layout.viewport_height());
        assert_eq!(layout.row_at(&state, 0), None);
        assert_eq!(layout.row_at(&state, 1), Some(0));
        assert_eq!(layout.row_at(&state, 2), Some(0));
        assert_eq!(layout.row_at(&state, 3), Some(1));
        assert_eq!(layout.row_at(&state, 5), None);
    }

    #[test]
    fn test_draws_channels_and_live_program() {
        let mut state = guide();
        let screen = render(&mut state);
        assert!(screen.contains("101"));
        assert!(screen.contains("One"));
        assert!(screen.contains("Two"));
        assert!(screen.contains("Midday News"));
        assert!(screen.contains('━'));
    }

    #[test]
    fn test_empty_state_message() {
        let mut state = guide();
        state.set_query("zzzzqqq");
        let screen = render(&mut state);
        assert!(screen.contains("No channels or programs match"));
    }
}
