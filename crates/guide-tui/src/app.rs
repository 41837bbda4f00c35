//! App: the terminal event loop around one `GuideState`.
//!
//! Architecture:
//! - `App` owns the guide state, the feed client and the widgets.
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background
//!   tasks (terminal input, feed fetches).
//! - Now-line ticks arrive on their own channel, driven by `NowLineTask`
//!   only while the grid is on screen.
//! - Scroll and resize are coalesced through `FrameThrottle`s and flushed on
//!   the frame tick.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use guide_core::collab::{DayPayload, Ingest, ReminderSet};
use guide_core::date_loader::DayRequest;
use guide_core::feed::FeedClient;
use guide_core::now_line::NowLineTask;
use guide_core::state::fetch_days;
use guide_core::throttle::FrameThrottle;
use guide_core::GuideState;
use guide_proto::config::Config;
use guide_proto::model::{Channel, DayKey};

use crate::grid::{draw_grid, GridLayout};
use crate::theme::{style_border, style_default, style_secondary, C_BG};
use crate::widgets::search_input::{SearchAction, SearchInput};
use crate::widgets::status_bar::{draw_separator, draw_status_bar, InputMode, StatusInfo};
use crate::widgets::toast::ToastManager;

const MIN_HOUR_WIDTH: f64 = 4.0;
const MAX_HOUR_WIDTH: f64 = 240.0;
const ZOOM_STEP: f64 = 1.5;
const DURATIONS: [u32; 3] = [24, 48, 72];
const SEARCH_PLACEHOLDER: &str = "channel, number or program title…";

enum AppMessage {
    Event(Event),
    /// Result of the cold-start fetch: channel list plus the anchor window.
    Initial {
        channels: anyhow::Result<Vec<Channel>>,
        days: Vec<(DayKey, anyhow::Result<DayPayload>)>,
    },
    DayLoaded(DayRequest, anyhow::Result<DayPayload>),
}

#[derive(Debug, Clone)]
struct NowTick;

pub struct App {
    state: GuideState,
    feed: FeedClient,
    notifications_file: PathBuf,
    toast: ToastManager,
    search: SearchInput,
    mode: InputMode,
    /// Selected row in the visible list.
    selected: usize,
    show_help: bool,
    should_quit: bool,
    initial_pending: bool,
    channel_col: u16,
    layout: GridLayout,
    frame_budget: Duration,
    scroll_throttle: FrameThrottle,
    resize_throttle: FrameThrottle,
    pending_dx: f64,
    pending_dy: f64,
    pending_area: Option<Rect>,
    now_task: NowLineTask,
    tx: Option<mpsc::Sender<AppMessage>>,
}

impl App {
    pub fn new(state: GuideState, feed: FeedClient, config: &Config) -> Self {
        let frame_budget = Duration::from_millis(config.guide.frame_budget_ms.max(1));
        Self {
            channel_col: state.settings().channel_column_width,
            state,
            feed,
            notifications_file: config.paths.notifications_file.clone(),
            toast: ToastManager::new(),
            search: SearchInput::new(SEARCH_PLACEHOLDER),
            mode: InputMode::Normal,
            selected: 0,
            show_help: false,
            should_quit: false,
            initial_pending: false,
            layout: GridLayout::default(),
            frame_budget,
            scroll_throttle: FrameThrottle::new(frame_budget),
            resize_throttle: FrameThrottle::new(frame_budget),
            pending_dx: 0.0,
            pending_dy: 0.0,
            pending_area: None,
            now_task: NowLineTask::new(Duration::from_secs(
                config.guide.now_line_period_secs.max(1),
            )),
            tx: None,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let result = self.event_loop(&mut terminal).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        self.now_task.stop();
        self.state.persist_settings();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);
        let (now_tx, mut now_rx) = mpsc::channel::<NowTick>(4);
        self.tx = Some(tx.clone());

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        let size = terminal.size()?;
        self.apply_resize(Rect::new(0, 0, size.width, size.height));
        self.start_initial_load();
        self.now_task.set_visible(true, &now_tx, NowTick);

        // ── Periodic timers ───────────────────────────────────────────────────
        let mut frame_tick = tokio::time::interval(self.frame_budget);
        frame_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg, &now_tx);
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else {
                            break;
                        };
                        drained += 1;
                        redraw |= self.handle_message(next, &now_tx);
                    }
                    needs_redraw = redraw;
                }

                Some(NowTick) = now_rx.recv() => {
                    self.state.set_notifications(ReminderSet::load(&self.notifications_file));
                    self.state.tick_now();
                    needs_redraw = true;
                }

                _ = frame_tick.tick() => {
                    needs_redraw = self.flush_throttled(Instant::now());
                }

                _ = toast_tick.tick() => {
                    if !self.toast.is_empty() {
                        self.toast.tick();
                        needs_redraw = true;
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns true when the screen needs a redraw.
    fn handle_message(&mut self, msg: AppMessage, now_tx: &mpsc::Sender<NowTick>) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key, now_tx);
                true
            }
            AppMessage::Event(Event::Mouse(mouse)) => self.handle_mouse(mouse),
            AppMessage::Event(Event::Resize(width, height)) => {
                self.queue_resize(Rect::new(0, 0, width, height));
                true
            }
            AppMessage::Event(_) => false,
            AppMessage::Initial { channels, days } => {
                self.finish_initial_load(channels, days);
                true
            }
            AppMessage::DayLoaded(request, result) => {
                self.finish_day_load(request, result);
                true
            }
        }
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Warm start from the snapshot store when possible; otherwise fetch
    /// the channel list and the anchor window in the background.
    fn start_initial_load(&mut self) {
        if self.state.warm_start() {
            let summary = self.state.apply_initial(None, Vec::new());
            self.toast
                .info(format!("Restored {} channels from cache", summary.channels));
            self.request_next();
            return;
        }
        let Some(tx) = self.tx.clone() else {
            return;
        };
        self.initial_pending = true;
        self.toast.spinner("Loading guide");
        let feed = self.feed.clone();
        let missing = self.state.missing_days();
        tokio::spawn(async move {
            let channels = feed.fetch_channels().await;
            let days = if channels.is_ok() {
                fetch_days(&feed, &missing).await
            } else {
                Vec::new()
            };
            let _ = tx.send(AppMessage::Initial { channels, days }).await;
        });
    }

    fn finish_initial_load(
        &mut self,
        channels: anyhow::Result<Vec<Channel>>,
        days: Vec<(DayKey, anyhow::Result<DayPayload>)>,
    ) {
        self.initial_pending = false;
        self.toast.dismiss_spinner();
        match channels {
            Ok(channels) => {
                let summary = self.state.apply_initial(Some(channels), days);
                self.toast.success(format!(
                    "Loaded {} channels, {} days",
                    summary.channels,
                    summary.days.len()
                ));
                for failure in &summary.failures {
                    self.toast.warning(failure.to_string());
                }
                self.selected = 0;
                self.request_next();
            }
            Err(e) => {
                error!("Initial load failed: {:#}", e);
                self.toast.error(format!("Guide unavailable: {}", e));
            }
        }
    }

    fn spawn_fetch(&mut self, request: DayRequest) {
        let Some(tx) = self.tx.clone() else {
            return;
        };
        self.toast.spinner(format!("Loading {}", request.day));
        let feed = self.feed.clone();
        tokio::spawn(async move {
            let result = feed.fetch_day(request.day).await;
            let _ = tx.send(AppMessage::DayLoaded(request, result)).await;
        });
    }

    /// Anchor-window gaps first, then proximity to a loaded edge.
    fn request_next(&mut self) {
        match self.state.next_request() {
            Some(request) => self.spawn_fetch(request),
            None if !self.state.is_loading() => self.toast.dismiss_spinner(),
            None => {}
        }
    }

    fn finish_day_load(&mut self, request: DayRequest, result: anyhow::Result<DayPayload>) {
        match self.state.complete_load(request, result) {
            Ok(outcome) => {
                debug!(
                    "[loader] {} merged: {} new, {} duplicates, {} conflicts{}",
                    outcome.day,
                    outcome.report.inserted,
                    outcome.report.duplicates,
                    outcome.report.conflicts,
                    if outcome.recheck { ", rechecking" } else { "" }
                );
                self.clamp_selection();
                self.request_next();
            }
            Err(e) => {
                // No automatic retry: the next scroll near the edge, or 'r',
                // asks for the day again.
                warn!("{}", e);
                self.toast.dismiss_spinner();
                self.toast.error(e.to_string());
            }
        }
    }

    fn reload(&mut self) {
        if self.initial_pending {
            return;
        }
        if self.state.catalog().is_empty() {
            self.start_initial_load();
        } else {
            self.request_next();
        }
    }

    fn reset(&mut self) {
        if self.initial_pending {
            return;
        }
        self.state.reset();
        self.selected = 0;
        self.toast.info("Guide cache cleared");
        self.start_initial_load();
    }

    // ── Scroll & resize ───────────────────────────────────────────────────────

    fn queue_scroll(&mut self, dx: f64, dy: f64) {
        self.pending_dx += dx;
        self.pending_dy += dy;
        if self.scroll_throttle.try_run(Instant::now()) {
            self.apply_scroll();
        }
    }

    fn apply_scroll(&mut self) {
        let (dx, dy) = (self.pending_dx, self.pending_dy);
        self.pending_dx = 0.0;
        self.pending_dy = 0.0;
        if dy != 0.0 {
            self.state.scroll_rows_by(dy);
        }
        if dx != 0.0 {
            if let Some(request) = self.state.scroll_time_by(dx) {
                self.spawn_fetch(request);
            }
        }
    }

    fn queue_resize(&mut self, area: Rect) {
        self.pending_area = Some(area);
        if self.resize_throttle.try_run(Instant::now()) {
            self.apply_resize(area);
        }
    }

    fn apply_resize(&mut self, area: Rect) {
        self.pending_area = None;
        let (grid, _, _) = split(area);
        self.layout = GridLayout::new(grid, self.channel_col);
        self.state
            .resize(self.layout.viewport_width(), self.layout.viewport_height());
    }

    /// Trailing runs for scroll/resize calls that landed inside the budget.
    fn flush_throttled(&mut self, now: Instant) -> bool {
        let mut ran = false;
        if self.resize_throttle.flush(now) {
            if let Some(area) = self.pending_area {
                self.apply_resize(area);
                ran = true;
            }
        }
        if self.scroll_throttle.flush(now) {
            self.apply_scroll();
            ran = true;
        }
        ran
    }

    // ── Selection ─────────────────────────────────────────────────────────────

    fn selected_channel(&self) -> Option<&Channel> {
        self.state.visible().channels.get(self.selected)
    }

    fn clamp_selection(&mut self) {
        let len = self.state.visible().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    fn select(&mut self, index: usize) {
        let len = self.state.visible().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        self.selected = index.min(len - 1);
        self.state.reveal_row(self.selected);
    }

    fn move_selection(&mut self, delta: i64) {
        let target = (self.selected as i64 + delta).max(0) as usize;
        self.select(target);
    }

    fn after_filter_change(&mut self) {
        self.selected = 0;
        if !self.state.visible().is_empty() {
            self.state.reveal_row(0);
        }
    }

    // ── Key handling ──────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent, now_tx: &mpsc::Sender<NowTick>) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.mode == InputMode::Search {
            self.handle_search_key(key);
            return;
        }
        if self.show_help {
            self.set_help(false, now_tx);
            return;
        }

        let hour = self.state.mapper().hour_width();
        let page = self.state.virtualizer().viewport_rows().max(2) as i64 - 1;
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.set_help(true, now_tx),
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(page),
            KeyCode::PageUp => self.move_selection(-page),
            KeyCode::Home => self.select(0),
            KeyCode::End => self.select(usize::MAX),
            KeyCode::Char('h') | KeyCode::Left => self.queue_scroll(-hour, 0.0),
            KeyCode::Char('l') | KeyCode::Right => self.queue_scroll(hour, 0.0),
            KeyCode::Char('H') => self.queue_scroll(-self.state.viewport_width() * 0.8, 0.0),
            KeyCode::Char('L') => self.queue_scroll(self.state.viewport_width() * 0.8, 0.0),
            KeyCode::Char('n') => {
                self.state.jump_to_now();
                self.request_next();
            }
            KeyCode::Char('[') => self.shift_anchor(-1),
            KeyCode::Char(']') => self.shift_anchor(1),
            KeyCode::Char('T') => {
                self.state.anchor_today();
                self.request_next();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.zoom(ZOOM_STEP),
            KeyCode::Char('-') => self.zoom(1.0 / ZOOM_STEP),
            KeyCode::Char('/') => {
                self.mode = InputMode::Search;
                self.search.activate();
            }
            KeyCode::Esc if self.state.filter().is_searching() => {
                self.search = SearchInput::new(SEARCH_PLACEHOLDER);
                self.state.set_query("");
                self.after_filter_change();
            }
            KeyCode::Char('g') => {
                let count = self.state.cycle_group();
                self.after_filter_change();
                self.toast
                    .info(format!("Group: {} ({})", self.state.filter().group, count));
            }
            KeyCode::Char('s') => {
                let count = self.state.cycle_source();
                self.after_filter_change();
                let source = self.state.filter().source.as_deref().unwrap_or("all sources");
                self.toast.info(format!("Source: {} ({})", source, count));
            }
            KeyCode::Char('t') => {
                let scope = self.state.toggle_search_scope();
                self.after_filter_change();
                self.toast.info(format!("Search: {}", scope.label()));
            }
            KeyCode::Char('f') => self.toggle_favorite(),
            KeyCode::Enter => self.play_selected(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('R') => self.reset(),
            KeyCode::Char('D') => self.cycle_duration(),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match self.search.handle_key(key) {
            SearchAction::Changed(query) => {
                self.state.set_query(&query);
                self.after_filter_change();
            }
            SearchAction::Confirmed | SearchAction::Cancelled => self.mode = InputMode::Normal,
            SearchAction::None => {}
        }
    }

    fn set_help(&mut self, show: bool, now_tx: &mpsc::Sender<NowTick>) {
        self.show_help = show;
        // The grid is hidden behind the overlay; no point ticking it.
        self.now_task.set_visible(!show, now_tx, NowTick);
        if !show {
            self.state.tick_now();
        }
    }

    fn shift_anchor(&mut self, days: i64) {
        self.state.shift_anchor(days);
        self.toast
            .info(format!("Guide for {}", self.state.settings().current_date));
        self.request_next();
    }

    fn cycle_duration(&mut self) {
        let next = next_duration(self.state.settings().guide_duration_hours);
        self.state.set_guide_duration(next);
        self.toast.info(format!("Guide spans {}h", next));
        self.request_next();
    }

    fn zoom(&mut self, factor: f64) {
        let width = (self.state.mapper().hour_width() * factor).clamp(MIN_HOUR_WIDTH, MAX_HOUR_WIDTH);
        self.state.set_hour_width(width);
    }

    fn toggle_favorite(&mut self) {
        let Some(channel) = self.selected_channel().cloned() else {
            return;
        };
        match self.state.toggle_favorite(&channel.id) {
            Some(true) => self.toast.success(format!("★ {}", channel.label())),
            Some(false) => self.toast.info(format!("Removed {} from favorites", channel.label())),
            None => {}
        }
        self.clamp_selection();
    }

    fn play_selected(&mut self) {
        let Some(id) = self.selected_channel().map(|c| c.id.clone()) else {
            return;
        };
        let airing = self
            .state
            .cache()
            .program_at(&id, self.state.now())
            .map(|p| p.title.clone());
        if let Some(channel) = self.state.play_channel(&id) {
            info!("Play {} -> {}", channel.id, channel.url);
            match airing {
                Some(title) => self
                    .toast
                    .success(format!("Tuned to {}: {}", channel.label(), title)),
                None => self.toast.success(format!("Tuned to {}", channel.label())),
            }
        }
        self.clamp_selection();
    }

    // ── Mouse handling ────────────────────────────────────────────────────────

    fn handle_mouse(&mut self, event: MouseEvent) -> bool {
        let rows = self.state.virtualizer().row_height();
        let hour = self.state.mapper().hour_width();
        let horizontal = event.modifiers.contains(KeyModifiers::SHIFT);
        match event.kind {
            MouseEventKind::ScrollDown if horizontal => self.queue_scroll(hour, 0.0),
            MouseEventKind::ScrollUp if horizontal => self.queue_scroll(-hour, 0.0),
            MouseEventKind::ScrollDown => self.queue_scroll(0.0, rows),
            MouseEventKind::ScrollUp => self.queue_scroll(0.0, -rows),
            MouseEventKind::ScrollRight => self.queue_scroll(hour, 0.0),
            MouseEventKind::ScrollLeft => self.queue_scroll(-hour, 0.0),
            MouseEventKind::Down(MouseButton::Left) => {
                match self.layout.row_at(&self.state, event.row) {
                    Some(index) => self.selected = index,
                    None => return false,
                }
            }
            _ => return false,
        }
        true
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn search_visible(&self) -> bool {
        self.mode == InputMode::Search || self.state.filter().is_searching()
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let (grid_area, bar_area, status_area) = split(area);
        // Laid out from the real frame; the state's geometry may lag by one
        // throttled resize.
        self.layout = GridLayout::new(grid_area, self.channel_col);

        let loading = self.initial_pending || self.state.is_loading();
        draw_grid(frame, &self.layout, &self.state, Some(self.selected), loading);

        if self.search_visible() {
            self.search
                .draw(frame, bar_area, self.state.settings().search_scope.label());
        } else {
            draw_separator(frame, bar_area);
        }

        let info = StatusInfo {
            mode: self.mode,
            anchor: self.state.settings().current_date.to_string(),
            group: self.state.filter().group.to_string(),
            source: self.state.filter().source.as_deref(),
            visible: self.state.visible().len(),
            total: self.state.catalog().len(),
            loading,
        };
        draw_status_bar(frame, status_area, &info);

        if self.show_help {
            draw_help(frame, area);
        }
        self.toast.draw(frame, area);
    }
}

/// `(grid, search bar or separator, status bar)`.
fn split(area: Rect) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);
    (chunks[0], chunks[1], chunks[2])
}

fn next_duration(current: u32) -> u32 {
    DURATIONS
        .iter()
        .copied()
        .find(|&h| h > current)
        .unwrap_or(DURATIONS[0])
}

const HELP: &[(&str, &str)] = &[
    ("j / k, ↑ / ↓", "select channel"),
    ("PgUp / PgDn, Home / End", "page / jump"),
    ("h / l, ← / →", "scroll one hour"),
    ("H / L", "scroll one screen"),
    ("Shift+wheel", "scroll time"),
    ("n", "jump to now"),
    ("[ / ]", "previous / next day"),
    ("T", "back to today"),
    ("+ / -", "zoom time scale"),
    ("/", "search"),
    ("t", "search scope: channels / programs"),
    ("g / s", "cycle group / source"),
    ("f", "toggle favorite"),
    ("Enter", "play channel"),
    ("r", "retry loading"),
    ("R", "discard cache and reload"),
    ("D", "guide span 24 / 48 / 72h"),
    ("q", "quit"),
];

fn draw_help(frame: &mut Frame, area: Rect) {
    let width = 56.min(area.width);
    let height = (HELP.len() as u16 + 2).min(area.height);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    let lines: Vec<Line> = HELP
        .iter()
        .map(|(keys, what)| {
            Line::from(vec![
                Span::styled(format!(" {:<26}", keys), style_default()),
                Span::styled(*what, style_secondary()),
            ])
        })
        .collect();
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(style_border())
                .title(" keys "),
        ),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_grid_above_bars() {
        let (grid, bar, status) = split(Rect::new(0, 0, 80, 24));
        assert_eq!((grid.height, bar.height, status.height), (22, 1, 1));
        assert_eq!((bar.y, status.y), (22, 23));
    }

    #[test]
    fn test_duration_cycles_and_wraps() {
        assert_eq!(next_duration(24), 48);
        assert_eq!(next_duration(48), 72);
        assert_eq!(next_duration(72), 24);
        assert_eq!(next_duration(36), 48);
    }
}
