//! `GuideState`: the single owned object behind a guide view.
//!
//! Components borrow what they need from here; nothing lives in globals.
//! Every mutation (merge, favorite toggle, filter change, re-anchor) runs to
//! completion and rebuilds the rows before returning, so a render can never
//! observe a half-merged cache or a visible list older than the last
//! finalize.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use guide_proto::config::GuideConfig;
use guide_proto::model::{Channel, DayKey, GuideSettings, SearchScope};
use guide_proto::store::GuideSnapshot;
use tracing::{debug, info, warn};

use crate::catalog::ChannelCatalog;
use crate::collab::{DayPayload, Ingest, NoNotifications, NotificationLookup, SettingsSink, SnapshotStore};
use crate::date_loader::{DateRangeLoader, DayRequest, LoadOutcome, DEFAULT_EDGE_FRACTION};
use crate::error::GuideError;
use crate::filter::{FilterController, GroupFilter, VisibleChannelList};
use crate::now_line::{NowIndicator, NowLineUpdate, NowLineUpdater, NowTrigger};
use crate::program_cache::{MergeReport, ProgramCache};
use crate::rows::{build_rows, RowContext, RowDescriptor};
use crate::search::{SearchIndex, SearchResults};
use crate::timeline::TimelineMapper;
use crate::virtualizer::{Virtualizer, WindowState};

/// Source of "now". Swappable so tests run against fixed instants.
pub type Clock = fn() -> DateTime<Utc>;

/// Geometry and loader knobs that are not part of `GuideSettings`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuideOptions {
    pub row_height: f64,
    pub overscan: usize,
    pub edge_fraction: f64,
}

impl Default for GuideOptions {
    fn default() -> Self {
        Self {
            row_height: 2.0,
            overscan: 4,
            edge_fraction: DEFAULT_EDGE_FRACTION,
        }
    }
}

impl From<&GuideConfig> for GuideOptions {
    fn from(config: &GuideConfig) -> Self {
        Self {
            row_height: config.row_height,
            overscan: config.overscan,
            edge_fraction: config.edge_fraction,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadSummary {
    /// Channels and programs came from the snapshot store.
    pub warm: bool,
    pub channels: usize,
    /// Days merged by this load, in request order.
    pub days: Vec<DayKey>,
    pub failures: Vec<GuideError>,
}

/// Fetch several days concurrently. Results come back in `days` order.
pub async fn fetch_days<I: Ingest>(
    ingest: &I,
    days: &[DayKey],
) -> Vec<(DayKey, anyhow::Result<DayPayload>)> {
    let results = join_all(days.iter().map(|&day| ingest.fetch_day(day))).await;
    days.iter().copied().zip(results).collect()
}

pub struct GuideState {
    settings: GuideSettings,
    catalog: ChannelCatalog,
    cache: ProgramCache,
    mapper: TimelineMapper,
    filter: FilterController,
    index: SearchIndex,
    visible: VisibleChannelList,
    virtualizer: Virtualizer,
    loader: DateRangeLoader,
    now_line: NowLineUpdater,
    rows: Vec<RowDescriptor>,
    notifications: Box<dyn NotificationLookup + Send>,
    settings_sink: Option<Box<dyn SettingsSink + Send>>,
    snapshots: Option<Box<dyn SnapshotStore + Send>>,
    clock: Clock,
    scroll_left: f64,
    viewport_width: f64,
    /// Bumped whenever the view context changes under an in-flight load.
    generation: u64,
}

impl GuideState {
    pub fn new(settings: GuideSettings, options: GuideOptions) -> Self {
        let mapper = TimelineMapper::new(
            settings.current_date,
            settings.guide_duration_hours,
            settings.hour_width,
        );
        Self {
            settings,
            catalog: ChannelCatalog::new(),
            cache: ProgramCache::new(),
            mapper,
            filter: FilterController::new(),
            index: SearchIndex::default(),
            visible: VisibleChannelList::default(),
            virtualizer: Virtualizer::new(options.row_height, options.overscan),
            loader: DateRangeLoader::new(options.edge_fraction),
            now_line: NowLineUpdater::new(),
            rows: Vec::new(),
            notifications: Box::new(NoNotifications),
            settings_sink: None,
            snapshots: None,
            clock: Utc::now,
            scroll_left: 0.0,
            viewport_width: 0.0,
            generation: 0,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifications(mut self, lookup: impl NotificationLookup + Send + 'static) -> Self {
        self.notifications = Box::new(lookup);
        self
    }

    pub fn with_settings_sink(mut self, sink: impl SettingsSink + Send + 'static) -> Self {
        self.settings_sink = Some(Box::new(sink));
        self
    }

    pub fn with_snapshot_store(mut self, store: impl SnapshotStore + Send + 'static) -> Self {
        self.snapshots = Some(Box::new(store));
        self
    }

    /// Swap the notification lookup (e.g. after the reminder file changed).
    pub fn set_notifications(&mut self, lookup: impl NotificationLookup + Send + 'static) {
        self.notifications = Box::new(lookup);
        self.rebuild_rows();
    }

    // --- read side -------------------------------------------------------

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn settings(&self) -> &GuideSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &ChannelCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    pub fn mapper(&self) -> &TimelineMapper {
        &self.mapper
    }

    pub fn filter(&self) -> &FilterController {
        &self.filter
    }

    pub fn visible(&self) -> &VisibleChannelList {
        &self.visible
    }

    pub fn search_results(&self) -> &SearchResults {
        &self.visible.search
    }

    pub fn window(&self) -> &WindowState {
        self.virtualizer.state()
    }

    pub fn virtualizer(&self) -> &Virtualizer {
        &self.virtualizer
    }

    /// Materialized rows only.
    pub fn rows(&self) -> &[RowDescriptor] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&RowDescriptor> {
        self.rows.iter().find(|r| r.index == index)
    }

    pub fn now_indicator(&self) -> NowIndicator {
        self.now_line.indicator()
    }

    pub fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    /// `Some(DataUnavailable)` when the renderer should show its empty state.
    pub fn empty_state(&self) -> Option<GuideError> {
        self.visible.is_empty().then_some(GuideError::DataUnavailable)
    }

    pub fn snapshot(&self) -> GuideSnapshot {
        GuideSnapshot {
            channels: self.catalog.channels().to_vec(),
            programs: self.cache.to_map(),
            loaded_dates: self.cache.loaded_days(),
        }
    }

    /// Days of the anchor window not loaded yet, ascending.
    pub fn missing_days(&self) -> Vec<DayKey> {
        let (from, to) = self.mapper.anchor_window();
        let mut days = Vec::new();
        let mut day = DayKey::of(from);
        while day.midnight() < to {
            if !self.cache.is_date_loaded(day) {
                days.push(day);
            }
            day = day.next();
        }
        days
    }

    // --- data in ---------------------------------------------------------

    /// Replace the channel list. Returns how many duplicate ids were dropped.
    /// Call `finalize` once the batch of changes is complete.
    pub fn load_channels(&mut self, channels: Vec<Channel>) -> usize {
        self.catalog.replace(channels, &self.settings)
    }

    /// Merge one day and widen the timeline. No scroll adjustment; use
    /// `complete_load` for scroll-driven loads.
    pub fn merge_day(&mut self, day: DayKey, payload: DayPayload) -> MergeReport {
        let report = self.cache.merge_day(day, payload);
        self.mapper.include_day(day);
        report
    }

    pub fn restore(&mut self, snapshot: GuideSnapshot) {
        self.catalog.replace(snapshot.channels, &self.settings);
        self.cache.restore(snapshot.programs, &snapshot.loaded_dates);
        self.mapper.reset_loaded(&snapshot.loaded_dates);
        info!(
            "Restored {} channels, {} programs, {} days from snapshot",
            self.catalog.len(),
            self.cache.total_programs(),
            snapshot.loaded_dates.len()
        );
    }

    /// Restore from the snapshot store. False when there is no usable
    /// snapshot.
    pub fn warm_start(&mut self) -> bool {
        let Some(snapshot) = self.snapshots.as_ref().and_then(|s| s.load_snapshot()) else {
            return false;
        };
        if snapshot.is_empty() {
            return false;
        }
        self.restore(snapshot);
        true
    }

    /// Drop every channel, program and loaded day, including the stored
    /// snapshot so the next start is cold.
    pub fn reset(&mut self) {
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.clear_snapshot() {
                warn!("Failed to clear guide snapshot: {:#}", e);
            }
        }
        self.catalog.clear();
        self.cache.clear();
        self.mapper.reset_loaded(&[]);
        self.generation += 1;
        self.scroll_left = 0.0;
        self.index = SearchIndex::default();
        let _ = self.refilter(false);
        info!("Guide reset");
    }

    /// Apply the result of an initial load. `channels` is `None` when the
    /// catalog was already restored by `warm_start`.
    pub fn apply_initial(
        &mut self,
        channels: Option<Vec<Channel>>,
        days: Vec<(DayKey, anyhow::Result<DayPayload>)>,
    ) -> LoadSummary {
        let mut summary = LoadSummary {
            warm: channels.is_none(),
            ..LoadSummary::default()
        };
        if let Some(channels) = channels {
            self.load_channels(channels);
        }
        summary.channels = self.catalog.len();

        for (day, result) in days {
            match result {
                Ok(payload) => {
                    self.merge_day(day, payload);
                    summary.days.push(day);
                }
                Err(e) => {
                    warn!("Initial load of {} failed: {:#}", day, e);
                    summary.failures.push(GuideError::FetchFailure {
                        day,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        if let Err(e) = self.finalize(false) {
            warn!("Initial load produced no channels: {}", e);
        }
        self.run_now_line(NowTrigger::Load);
        info!(
            "Initial load: {} channels, {} days ({} failed, warm={})",
            summary.channels,
            summary.days.len(),
            summary.failures.len(),
            summary.warm
        );
        summary
    }

    /// Warm start when possible, otherwise fetch the channel list. Either
    /// way, fetch whatever days the anchor window is missing.
    pub async fn initial_load<I: Ingest>(&mut self, ingest: &I) -> anyhow::Result<LoadSummary> {
        let channels = if self.warm_start() {
            None
        } else {
            Some(
                ingest
                    .fetch_channels()
                    .await
                    .context("Failed to fetch channel list")?,
            )
        };
        let missing = self.missing_days();
        let days = fetch_days(ingest, &missing).await;
        Ok(self.apply_initial(channels, days))
    }

    /// Re-index, re-filter, re-window and snapshot. Call after any change to
    /// the catalog or the cache.
    pub fn finalize(&mut self, preserve_scroll: bool) -> Result<usize, GuideError> {
        self.reindex();
        let result = self.refilter(preserve_scroll);
        self.save_snapshot();
        result
    }

    fn reindex(&mut self) {
        let (from, to) = self.mapper.anchor_window();
        self.index = SearchIndex::build(&self.catalog, &self.cache, from, to);
        debug!("[search] indexed {} programs in {}..{}", self.index.program_count(), from, to);
    }

    fn refilter(&mut self, preserve_scroll: bool) -> Result<usize, GuideError> {
        self.visible = self.filter.apply(&self.catalog, &self.settings, &self.index);
        self.virtualizer.set_len(self.visible.len(), preserve_scroll);
        self.rebuild_rows();
        if self.visible.is_empty() {
            debug!("[window] visible list is empty");
            Err(GuideError::DataUnavailable)
        } else {
            Ok(self.visible.len())
        }
    }

    fn rebuild_rows(&mut self) {
        let now = (self.clock)();
        self.rows = match self.virtualizer.state() {
            WindowState::Empty => Vec::new(),
            WindowState::Window(window) => {
                let ctx = RowContext {
                    mapper: &self.mapper,
                    cache: &self.cache,
                    notifications: self.notifications.as_ref(),
                    now,
                    row_height: self.virtualizer.row_height(),
                };
                build_rows(&self.visible.channels, window, &ctx)
            }
        };
    }

    fn save_snapshot(&self) {
        let Some(store) = &self.snapshots else {
            return;
        };
        if self.catalog.is_empty() {
            return;
        }
        if let Err(e) = store.save_snapshot(&self.snapshot()) {
            warn!("Failed to save guide snapshot: {:#}", e);
        }
    }

    // --- scroll & resize -------------------------------------------------

    fn max_scroll_left(&self) -> f64 {
        (self.mapper.total_width() - self.viewport_width).max(0.0)
    }

    /// Resize event. Never triggers a load by itself; only horizontal
    /// scrolling does.
    pub fn resize(&mut self, viewport_width: f64, viewport_height: f64) {
        self.viewport_width = if viewport_width.is_finite() {
            viewport_width.max(0.0)
        } else {
            0.0
        };
        self.scroll_left = self.scroll_left.clamp(0.0, self.max_scroll_left());
        self.virtualizer.set_viewport(viewport_height);
        self.rebuild_rows();
    }

    pub fn scroll_rows_to(&mut self, scroll_top: f64) {
        self.virtualizer.scroll_to(scroll_top);
        self.rebuild_rows();
    }

    pub fn scroll_rows_by(&mut self, delta: f64) {
        self.scroll_rows_to(self.virtualizer.scroll_top() + delta);
    }

    /// Horizontal scroll. Returns a day fetch when the viewport came close
    /// to a loaded edge and nothing else is loading.
    pub fn scroll_time_to(&mut self, scroll_left: f64) -> Option<DayRequest> {
        self.scroll_left = if scroll_left.is_finite() {
            scroll_left.clamp(0.0, self.max_scroll_left())
        } else {
            0.0
        };
        self.loader.on_scroll(
            self.scroll_left,
            self.viewport_width,
            &self.mapper,
            &self.cache,
            self.generation,
        )
    }

    pub fn scroll_time_by(&mut self, delta: f64) -> Option<DayRequest> {
        self.scroll_time_to(self.scroll_left + delta)
    }

    /// Change the horizontal scale, keeping the instant at the left edge
    /// of the viewport in place.
    pub fn set_hour_width(&mut self, hour_width: f64) {
        if hour_width <= 0.0 {
            return;
        }
        let anchored = self.mapper.x_to_time(self.scroll_left);
        self.mapper.set_hour_width(hour_width);
        self.settings.hour_width = hour_width;
        self.scroll_left = self
            .mapper
            .time_to_x(anchored)
            .clamp(0.0, self.max_scroll_left());
        self.rebuild_rows();
        self.run_now_line(NowTrigger::Tick);
    }

    /// Bring `channel_id` into view. Unknown or filtered-out channels are a
    /// logged no-op.
    pub fn reveal_channel(&mut self, channel_id: &str) -> bool {
        match self.visible.position(channel_id) {
            Some(index) => self.reveal_row(index),
            None => {
                warn!(
                    "[window] {}",
                    GuideError::RenderTargetMissing(format!("channel {}", channel_id))
                );
                false
            }
        }
    }

    pub fn reveal_row(&mut self, index: usize) -> bool {
        if index >= self.visible.len() {
            warn!(
                "[window] {}",
                GuideError::RenderTargetMissing(format!("row {}", index))
            );
            return false;
        }
        self.virtualizer.reveal(index);
        self.rebuild_rows();
        true
    }

    // --- loading ---------------------------------------------------------

    /// Next day to fetch: gaps in the anchor window first, then whichever
    /// edge the viewport is near. `None` while a load is in flight.
    pub fn next_request(&mut self) -> Option<DayRequest> {
        if self.loader.is_loading() {
            return None;
        }
        if let Some(&day) = self.missing_days().first() {
            return self.loader.request(day, &self.cache, self.generation);
        }
        self.loader.on_scroll(
            self.scroll_left,
            self.viewport_width,
            &self.mapper,
            &self.cache,
            self.generation,
        )
    }

    /// Apply a finished day fetch: merge, widen the timeline, keep the
    /// visible content steady, then finalize with the scroll preserved.
    pub fn complete_load(
        &mut self,
        request: DayRequest,
        result: anyhow::Result<DayPayload>,
    ) -> Result<LoadOutcome, GuideError> {
        let outcome = self.loader.complete(
            request,
            result,
            &mut self.cache,
            &mut self.mapper,
            self.scroll_left,
            self.generation,
        )?;
        self.scroll_left = outcome.scroll_left.clamp(0.0, self.max_scroll_left());
        if let Err(e) = self.finalize(true) {
            debug!("[loader] {} merged into an empty view: {}", outcome.day, e);
        }
        self.run_now_line(NowTrigger::Tick);
        Ok(outcome)
    }

    /// Drive `next_request` / fetch / `complete_load` until nothing is
    /// pending or `limit` days were loaded. Stops at the first failure.
    pub async fn load_pending<I: Ingest>(
        &mut self,
        ingest: &I,
        limit: usize,
    ) -> Result<Vec<LoadOutcome>, GuideError> {
        let mut outcomes = Vec::new();
        while outcomes.len() < limit {
            let Some(request) = self.next_request() else {
                break;
            };
            let result = ingest.fetch_day(request.day).await;
            outcomes.push(self.complete_load(request, result)?);
        }
        Ok(outcomes)
    }

    // --- now-line --------------------------------------------------------

    fn run_now_line(&mut self, trigger: NowTrigger) -> NowLineUpdate {
        let now = (self.clock)();
        let update = self
            .now_line
            .run(&self.mapper, &mut self.rows, now, trigger, self.viewport_width);
        if let Some(left) = update.scroll_to {
            self.scroll_left = left;
        }
        update
    }

    /// Periodic tick: refresh live/past state of the materialized rows.
    pub fn tick_now(&mut self) -> NowLineUpdate {
        self.run_now_line(NowTrigger::Tick)
    }

    /// Explicit "jump to now". Re-anchors on today first when the current
    /// instant is outside the timeline.
    pub fn jump_to_now(&mut self) -> NowLineUpdate {
        let now = (self.clock)();
        if !self.mapper.contains(now) {
            self.set_anchor(DayKey::of(now));
        }
        self.run_now_line(NowTrigger::JumpToNow)
    }

    // --- anchor date -----------------------------------------------------

    /// Re-anchor on `day`. Returns the days the new anchor window still
    /// needs; request them through `next_request`.
    pub fn set_anchor(&mut self, day: DayKey) -> Vec<DayKey> {
        self.settings.current_date = day;
        self.mapper.set_anchor(day);
        self.generation += 1;
        let _ = self.finalize(true);

        let now = (self.clock)();
        let (from, to) = self.mapper.anchor_window();
        let update = self.run_now_line(NowTrigger::DateChange);
        let now_in_window = from <= now && now < to;
        if update.scroll_to.is_none() || !now_in_window {
            self.scroll_left = self.mapper.time_to_x(from).clamp(0.0, self.max_scroll_left());
        }
        info!("Anchor date {} (generation {})", day, self.generation);
        self.missing_days()
    }

    pub fn shift_anchor(&mut self, days: i64) -> Vec<DayKey> {
        let day = DayKey::new(self.settings.current_date.0 + Duration::days(days));
        self.set_anchor(day)
    }

    pub fn anchor_today(&mut self) -> Vec<DayKey> {
        self.set_anchor(DayKey::of((self.clock)()))
    }

    pub fn set_guide_duration(&mut self, hours: u32) -> Vec<DayKey> {
        self.settings.guide_duration_hours = hours.max(1);
        self.mapper.set_duration_hours(hours);
        self.scroll_left = self.scroll_left.clamp(0.0, self.max_scroll_left());
        let _ = self.finalize(true);
        self.run_now_line(NowTrigger::Tick);
        self.missing_days()
    }

    // --- filters ---------------------------------------------------------
    // Each returns the visible count (0 means empty state).

    pub fn set_query(&mut self, query: &str) -> usize {
        if self.filter.query == query {
            return self.visible.len();
        }
        self.filter.query = query.to_string();
        self.refilter(false).unwrap_or(0)
    }

    pub fn set_group(&mut self, group: GroupFilter) -> usize {
        self.filter.group = group;
        self.refilter(false).unwrap_or(0)
    }

    pub fn cycle_group(&mut self) -> usize {
        self.filter.cycle_group(&self.catalog);
        self.refilter(false).unwrap_or(0)
    }

    pub fn set_source(&mut self, source: Option<String>) -> usize {
        self.filter.source = source;
        self.refilter(false).unwrap_or(0)
    }

    pub fn cycle_source(&mut self) -> usize {
        self.filter.cycle_source(&self.catalog);
        self.refilter(false).unwrap_or(0)
    }

    pub fn toggle_search_scope(&mut self) -> SearchScope {
        self.settings.search_scope = self.settings.search_scope.toggle();
        self.persist_settings();
        if self.filter.is_searching() {
            let _ = self.refilter(false);
        }
        self.settings.search_scope
    }

    // --- user actions ----------------------------------------------------

    /// Returns the new favorite flag, `None` for an unknown channel.
    pub fn toggle_favorite(&mut self, channel_id: &str) -> Option<bool> {
        let Some(favorite) = self.catalog.toggle_favorite(channel_id, &mut self.settings) else {
            warn!(
                "{}",
                GuideError::RenderTargetMissing(format!("channel {}", channel_id))
            );
            return None;
        };
        self.persist_settings();
        let _ = self.refilter(true);
        Some(favorite)
    }

    /// Record a play and return the channel so the caller can hand its
    /// `url` to a player.
    pub fn play_channel(&mut self, channel_id: &str) -> Option<Channel> {
        if !self.catalog.record_played(channel_id, &mut self.settings) {
            warn!(
                "{}",
                GuideError::RenderTargetMissing(format!("channel {}", channel_id))
            );
            return None;
        }
        self.persist_settings();
        if self.filter.group == GroupFilter::Recents {
            let _ = self.refilter(true);
        }
        self.catalog.get(channel_id).cloned()
    }

    pub fn persist_settings(&self) {
        let Some(sink) = &self.settings_sink else {
            return;
        };
        if let Err(e) = sink.save_settings(&self.settings) {
            warn!("Failed to save settings: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use guide_proto::model::Program;
    use guide_proto::store::SnapshotDir;
    use std::sync::{Arc, Mutex};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn today() -> DayKey {
        DayKey::of(fixed_now())
    }

    fn settings() -> GuideSettings {
        GuideSettings {
            current_date: today(),
            hour_width: 10.0,
            ..GuideSettings::default()
        }
    }

    fn channel(id: &str, name: &str, group: &str) -> Channel {
        Channel {
            id: id.into(),
            name: name.into(),
            group: group.into(),
            ..Default::default()
        }
    }

    fn program(title: &str, start: DateTime<Utc>, hours: i64) -> Program {
        Program {
            channel_id: String::new(),
            title: title.into(),
            description: String::new(),
            start,
            stop: start + Duration::hours(hours),
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<GuideSettings>>>);

    impl SettingsSink for RecordingSink {
        fn save_settings(&self, settings: &GuideSettings) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(settings.clone());
            Ok(())
        }
    }

    fn state() -> GuideState {
        let mut s = GuideState::new(settings(), GuideOptions::default()).with_clock(fixed_now);
        s.load_channels(vec![
            channel("a", "Alpha", "News"),
            channel("b", "Bravo", "Sports"),
            channel("c", "Charlie", "News"),
        ]);
        let payload: DayPayload = [(
            "a".to_string(),
            vec![program("Noon News", today().midnight() + Duration::hours(11), 2)],
        )]
        .into_iter()
        .collect();
        s.merge_day(today(), payload);
        s.resize(200.0, 20.0);
        s.finalize(false).unwrap();
        s
    }

    #[test]
    fn test_empty_state_before_any_data() {
        let mut s = GuideState::new(settings(), GuideOptions::default());
        assert!(matches!(s.finalize(false), Err(GuideError::DataUnavailable)));
        assert_eq!(*s.window(), WindowState::Empty);
        assert!(s.rows().is_empty());
        assert!(s.empty_state().is_some());
    }

    #[test]
    fn test_finalize_materializes_rows_with_live_cell() {
        let s = state();
        assert_eq!(s.visible().len(), 3);
        assert_eq!(s.rows().len(), 3);
        let live = s.row(0).and_then(|r| r.live_cell()).unwrap();
        assert_eq!(live.title, "Noon News");
        assert!((live.progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_days_cover_anchor_window() {
        let s = state();
        assert_eq!(s.missing_days(), vec![today().next()]);
    }

    #[test]
    fn test_favorite_toggle_persists_and_refilters() {
        let sink = RecordingSink::default();
        let mut s = state().with_settings_sink(sink.clone());
        s.set_group(GroupFilter::Favorites);
        assert!(s.visible().is_empty());

        assert_eq!(s.toggle_favorite("b"), Some(true));
        assert_eq!(s.visible().channels[0].id, "b");
        assert_eq!(sink.0.lock().unwrap().last().unwrap().favorites, vec!["b"]);

        assert_eq!(s.toggle_favorite("zzz"), None);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_play_updates_recents() {
        let sink = RecordingSink::default();
        let mut s = state().with_settings_sink(sink.clone());
        s.set_group(GroupFilter::Recents);
        s.play_channel("c");
        s.play_channel("a");
        let ids: Vec<&str> = s.visible().channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_set_anchor_bumps_generation_and_scrolls() {
        let mut s = state();
        let before = s.generation();
        let missing = s.shift_anchor(2);
        assert_eq!(s.generation(), before + 1);
        assert_eq!(s.settings().current_date, today().next().next());
        assert_eq!(missing, vec![today().next().next(), today().next().next().next()]);
        // Now is outside the new anchor window: scroll lands on its midnight.
        let expected = s.mapper().time_to_x(s.mapper().anchor().midnight());
        assert_eq!(s.scroll_left(), expected.min(s.mapper().total_width() - 200.0));
    }

    #[test]
    fn test_jump_to_now_scrolls_marker_into_view() {
        let mut s = state();
        s.scroll_time_to(0.0);
        let update = s.jump_to_now();
        assert!(update.indicator.visible);
        assert_eq!(update.indicator.x, 120.0);
        assert_eq!(s.scroll_left(), 70.0);
    }

    #[test]
    fn test_reveal_unknown_channel_is_noop() {
        let mut s = state();
        let top = s.virtualizer().scroll_top();
        assert!(!s.reveal_channel("nope"));
        assert_eq!(s.virtualizer().scroll_top(), top);
    }

    #[test]
    fn test_shift_anchor_keeps_vertical_scroll() {
        let mut s = state();
        s.load_channels(
            (0..40)
                .map(|i| channel(&format!("ch{:02}", i), &format!("Channel {}", i), "News"))
                .collect(),
        );
        s.finalize(false).unwrap();
        s.scroll_rows_to(30.0);
        assert_eq!(s.virtualizer().scroll_top(), 30.0);

        s.shift_anchor(1);
        assert_eq!(s.virtualizer().scroll_top(), 30.0);
        s.anchor_today();
        assert_eq!(s.virtualizer().scroll_top(), 30.0);
    }

    #[test]
    fn test_shorter_guide_duration_clamps_scroll() {
        let mut s = state();
        s.set_guide_duration(72);
        assert_eq!(s.mapper().total_width(), 720.0);
        s.scroll_time_to(500.0);
        assert_eq!(s.scroll_left(), 500.0);

        let missing = s.set_guide_duration(24);
        assert!(missing.is_empty());
        assert_eq!(s.mapper().total_width(), 240.0);
        assert_eq!(s.scroll_left(), 40.0);
        assert!(s.row(0).and_then(|r| r.live_cell()).is_some());
    }

    #[test]
    fn test_date_change_saves_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut s = state().with_snapshot_store(SnapshotDir::new(dir.path()));
        assert!(SnapshotDir::new(dir.path()).load().is_none());

        s.shift_anchor(1);
        let snapshot = SnapshotDir::new(dir.path()).load().unwrap();
        assert_eq!(snapshot.channels.len(), 3);
        assert_eq!(snapshot.loaded_dates, vec![today()]);
    }

    #[test]
    fn test_reset_clears_cache_and_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut s = state().with_snapshot_store(SnapshotDir::new(dir.path()));
        s.finalize(true).unwrap();
        assert!(SnapshotDir::new(dir.path()).load().is_some());

        s.reset();
        assert!(s.catalog().is_empty());
        assert!(!s.cache().is_date_loaded(today()));
        assert_eq!(*s.window(), WindowState::Empty);
        assert!(SnapshotDir::new(dir.path()).load().is_none());
        assert!(!s.warm_start());
    }

    #[test]
    fn test_hour_width_change_keeps_left_instant() {
        let mut s = state();
        s.scroll_time_to(100.0);
        let t = s.mapper().x_to_time(s.scroll_left());
        s.set_hour_width(20.0);
        assert_eq!(s.mapper().x_to_time(s.scroll_left()), t);
    }
}
