//! Now-line: the current-time marker and live/past classification.
//!
//! A recompute touches only the rows currently materialized; rows outside
//! the render window are refreshed when they are next built.
//!
//! ```text
//!  Idle ──(tick | load | date change | jump)──▶ Recomputing ──▶ Idle
//! ```
//!
//! The periodic driver is `NowLineTask`: a tokio interval that exists only
//! while the guide view is visible.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::rows::{classify, progress, RowDescriptor};
use crate::timeline::TimelineMapper;

pub const NOW_LINE_PERIOD: Duration = Duration::from_secs(60);

/// What caused a recompute. Only explicit navigation scrolls the marker
/// into view; periodic ticks never move the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NowTrigger {
    Tick,
    /// The guide's first data arrived.
    Load,
    DateChange,
    JumpToNow,
}

impl NowTrigger {
    pub fn is_navigation(self) -> bool {
        !matches!(self, Self::Tick)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NowLinePhase {
    #[default]
    Idle,
    Recomputing,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NowIndicator {
    pub visible: bool,
    pub x: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NowLineUpdate {
    pub indicator: NowIndicator,
    /// New horizontal scroll offset, for navigation triggers only.
    pub scroll_to: Option<f64>,
    pub rows_touched: usize,
}

#[derive(Debug, Default)]
pub struct NowLineUpdater {
    phase: NowLinePhase,
    indicator: NowIndicator,
}

impl NowLineUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> NowLinePhase {
        self.phase
    }

    pub fn indicator(&self) -> NowIndicator {
        self.indicator
    }

    pub fn run(
        &mut self,
        mapper: &TimelineMapper,
        rows: &mut [RowDescriptor],
        now: DateTime<Utc>,
        trigger: NowTrigger,
        viewport_width: f64,
    ) -> NowLineUpdate {
        self.phase = NowLinePhase::Recomputing;

        let indicator = if mapper.contains(now) {
            NowIndicator {
                visible: true,
                x: mapper.time_to_x(now),
            }
        } else {
            NowIndicator {
                visible: false,
                x: 0.0,
            }
        };

        let scroll_to = (indicator.visible && trigger.is_navigation()).then(|| {
            // Keep a quarter of the viewport of context before "now".
            let max_left = (mapper.total_width() - viewport_width).max(0.0);
            (indicator.x - viewport_width * 0.25).clamp(0.0, max_left)
        });

        for row in rows.iter_mut() {
            for cell in &mut row.cells {
                cell.airing = classify(cell.start, cell.stop, now);
                cell.progress = progress(cell.start, cell.stop, now);
            }
        }

        if indicator.visible != self.indicator.visible {
            debug!("[now] indicator visible={}", indicator.visible);
        }
        trace!("[now] {:?}: x={:.1}, {} rows", trigger, indicator.x, rows.len());

        self.indicator = indicator;
        self.phase = NowLinePhase::Idle;
        NowLineUpdate {
            indicator,
            scroll_to,
            rows_touched: rows.len(),
        }
    }
}

/// Periodic driver bound to view visibility. Sends `msg` into the owner's
/// event channel every `period`; aborted when stopped or dropped.
pub struct NowLineTask {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl NowLineTask {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn start<M>(&mut self, tx: mpsc::Sender<M>, msg: M)
    where
        M: Clone + Send + 'static,
    {
        if self.is_running() {
            return;
        }
        let period = self.period;
        let first = tokio::time::Instant::now() + period;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(msg.clone()).await.is_err() {
                    break;
                }
            }
        }));
        debug!("[now] ticking every {:?}", period);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("[now] ticking stopped");
        }
    }

    /// Start when the view becomes visible, stop when it is hidden.
    pub fn set_visible<M>(&mut self, visible: bool, tx: &mpsc::Sender<M>, msg: M)
    where
        M: Clone + Send + 'static,
    {
        if visible {
            self.start(tx.clone(), msg);
        } else {
            self.stop();
        }
    }
}

impl Drop for NowLineTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::{Airing, ProgramCell};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use guide_proto::model::{DayKey, ProgramId};

    fn at(h: i64, m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
            + ChronoDuration::hours(h)
            + ChronoDuration::minutes(m)
    }

    fn row(start: DateTime<Utc>, stop: DateTime<Utc>) -> RowDescriptor {
        RowDescriptor {
            index: 0,
            channel_id: "ch".into(),
            label: "Ch".into(),
            chno: None,
            logo: String::new(),
            is_favorite: false,
            top: 0.0,
            cells: vec![ProgramCell {
                program_id: ProgramId::from_start(start),
                title: "Show".into(),
                start,
                stop,
                x: 0.0,
                width: 0.0,
                airing: Airing::Upcoming,
                progress: 0.0,
                has_notification: false,
            }],
        }
    }

    #[test]
    fn test_tick_updates_rows_without_scrolling() {
        let mapper = TimelineMapper::new(DayKey::of(at(0, 0)), 24, 60.0);
        let mut rows = vec![row(at(10, 0), at(11, 0))];
        let mut updater = NowLineUpdater::new();

        let update = updater.run(&mapper, &mut rows, at(10, 30), NowTrigger::Tick, 600.0);
        assert!(update.indicator.visible);
        assert_eq!(update.indicator.x, 630.0);
        assert_eq!(update.scroll_to, None);
        assert_eq!(rows[0].cells[0].airing, Airing::Live);
        assert!((rows[0].cells[0].progress - 0.5).abs() < 1e-9);
        assert_eq!(updater.phase(), NowLinePhase::Idle);
    }

    #[test]
    fn test_jump_scrolls_into_view() {
        let mapper = TimelineMapper::new(DayKey::of(at(0, 0)), 24, 60.0);
        let mut updater = NowLineUpdater::new();
        let update = updater.run(&mapper, &mut [], at(10, 30), NowTrigger::JumpToNow, 600.0);
        assert_eq!(update.scroll_to, Some(630.0 - 150.0));
        assert_eq!(update.rows_touched, 0);
    }

    #[test]
    fn test_hidden_outside_timeline() {
        let mapper = TimelineMapper::new(DayKey::of(at(0, 0)), 24, 60.0);
        let mut rows = vec![row(at(10, 0), at(11, 0))];
        let mut updater = NowLineUpdater::new();
        let update = updater.run(&mapper, &mut rows, at(24, 0), NowTrigger::JumpToNow, 600.0);
        assert!(!update.indicator.visible);
        assert_eq!(update.scroll_to, None);
        assert_eq!(rows[0].cells[0].airing, Airing::Past);
    }

    #[test]
    fn test_stop_instant_is_past() {
        let mapper = TimelineMapper::new(DayKey::of(at(0, 0)), 24, 60.0);
        let mut rows = vec![row(at(10, 0), at(11, 0))];
        NowLineUpdater::new().run(&mapper, &mut rows, at(11, 0), NowTrigger::Tick, 600.0);
        assert_eq!(rows[0].cells[0].airing, Airing::Past);
        assert_eq!(rows[0].cells[0].progress, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_ticks_then_stops() {
        let (tx, mut rx) = mpsc::channel::<u8>(8);
        let mut task = NowLineTask::new(Duration::from_secs(60));
        task.start(tx, 7);
        assert!(task.is_running());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(rx.recv().await, Some(7));

        task.stop();
        assert!(!task.is_running());
        // The aborted task drops its sender, closing the channel.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_controls_task() {
        let (tx, _rx) = mpsc::channel::<()>(8);
        let mut task = NowLineTask::new(NOW_LINE_PERIOD);
        task.set_visible(true, &tx, ());
        assert!(task.is_running());
        task.set_visible(false, &tx, ());
        assert!(!task.is_running());
    }
}
