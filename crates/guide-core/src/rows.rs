//! Row descriptors: the renderer-agnostic output of a virtualization pass.
//!
//! `build_rows` is pure. It only looks at channels inside the render window,
//! so its cost is bounded by the window size, never by the catalog size.

use chrono::{DateTime, Utc};
use guide_proto::model::{Channel, Program, ProgramId};

use crate::collab::NotificationLookup;
use crate::program_cache::ProgramCache;
use crate::timeline::TimelineMapper;
use crate::virtualizer::RenderWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Airing {
    Past,
    Live,
    Upcoming,
}

/// Classify against the half-open window `[start, stop)`.
pub fn classify(start: DateTime<Utc>, stop: DateTime<Utc>, now: DateTime<Utc>) -> Airing {
    if now >= stop {
        Airing::Past
    } else if now >= start {
        Airing::Live
    } else {
        Airing::Upcoming
    }
}

/// Elapsed fraction of a live program, in `[0, 1]`. Zero for anything not live.
pub fn progress(start: DateTime<Utc>, stop: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    if classify(start, stop, now) != Airing::Live {
        return 0.0;
    }
    let total = (stop - start).num_milliseconds();
    if total <= 0 {
        return 0.0;
    }
    let elapsed = (now - start).num_milliseconds();
    (elapsed as f64 / total as f64).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramCell {
    pub program_id: ProgramId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    /// Left edge, clipped to the timeline origin.
    pub x: f64,
    /// Width after clipping to the timeline extent.
    pub width: f64,
    pub airing: Airing,
    pub progress: f64,
    pub has_notification: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowDescriptor {
    /// Position in the visible channel list.
    pub index: usize,
    pub channel_id: String,
    pub label: String,
    pub chno: Option<String>,
    pub logo: String,
    pub is_favorite: bool,
    /// Absolute top of the row: `index * row_height`.
    pub top: f64,
    pub cells: Vec<ProgramCell>,
}

impl RowDescriptor {
    pub fn live_cell(&self) -> Option<&ProgramCell> {
        self.cells.iter().find(|c| c.airing == Airing::Live)
    }
}

/// Everything a pass reads besides the list and the window.
pub struct RowContext<'a> {
    pub mapper: &'a TimelineMapper,
    pub cache: &'a ProgramCache,
    pub notifications: &'a dyn NotificationLookup,
    pub now: DateTime<Utc>,
    pub row_height: f64,
}

pub fn build_rows(
    visible: &[Channel],
    window: &RenderWindow,
    ctx: &RowContext<'_>,
) -> Vec<RowDescriptor> {
    let end = window.end.min(visible.len());
    let start = window.start.min(end);
    let (from, to) = (ctx.mapper.origin(), ctx.mapper.extent());

    visible[start..end]
        .iter()
        .enumerate()
        .map(|(offset, channel)| {
            let index = start + offset;
            let cells = ctx
                .cache
                .programs_in(&channel.id, from, to)
                .map(|p| build_cell(&channel.id, p, ctx))
                .collect();
            RowDescriptor {
                index,
                channel_id: channel.id.clone(),
                label: channel.label().to_string(),
                chno: channel.chno.clone(),
                logo: channel.logo.clone(),
                is_favorite: channel.is_favorite,
                top: index as f64 * ctx.row_height,
                cells,
            }
        })
        .collect()
}

fn build_cell(channel_id: &str, p: &Program, ctx: &RowContext<'_>) -> ProgramCell {
    let mapper = ctx.mapper;
    let x = mapper.time_to_x(p.start.max(mapper.origin()));
    let right = mapper.time_to_x(p.stop.min(mapper.extent()));
    let id = p.id();
    ProgramCell {
        program_id: id,
        title: p.title.clone(),
        start: p.start,
        stop: p.stop,
        x,
        width: (right - x).max(0.0),
        airing: classify(p.start, p.stop, ctx.now),
        progress: progress(p.start, p.stop, ctx.now),
        has_notification: ctx.notifications.has_notification(channel_id, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::ReminderSet;
    use crate::virtualizer::compute_window;
    use chrono::{Duration, TimeZone};
    use guide_proto::model::DayKey;

    fn at(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn channels(n: usize) -> Vec<Channel> {
        (0..n)
            .map(|i| Channel {
                id: format!("ch{}", i),
                name: format!("Channel {}", i),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_classify_stop_is_past() {
        assert_eq!(classify(at(1), at(2), at(2)), Airing::Past);
        assert_eq!(classify(at(1), at(2), at(1)), Airing::Live);
        assert_eq!(classify(at(1), at(2), at(0)), Airing::Upcoming);
        assert_eq!(progress(at(1), at(2), at(2)), 0.0);
    }

    #[test]
    fn test_progress_midway() {
        let now = at(1) + Duration::minutes(15);
        assert!((progress(at(1), at(2), now) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_only_window_rows_materialized() {
        let list = channels(500);
        let mapper = TimelineMapper::new(DayKey::of(at(0)), 24, 60.0);
        let mut cache = ProgramCache::new();
        for c in &list {
            cache.merge_programs(
                &c.id,
                vec![Program {
                    channel_id: String::new(),
                    title: "Show".into(),
                    description: String::new(),
                    start: at(3),
                    stop: at(4),
                }],
                DayKey::of(at(0)),
            );
        }
        let reminders: ReminderSet = [("ch101".to_string(), ProgramId::from_start(at(3)))]
            .into_iter()
            .collect();
        let ctx = RowContext {
            mapper: &mapper,
            cache: &cache,
            notifications: &reminders,
            now: at(3) + Duration::minutes(30),
            row_height: 20.0,
        };
        let window = *compute_window(list.len(), 20.0, 2, 2000.0, 200.0)
            .window()
            .unwrap();
        let rows = build_rows(&list, &window, &ctx);

        assert_eq!(rows.len(), window.len());
        assert_eq!(rows[0].index, window.start);
        assert_eq!(rows[0].top, window.offset_y);
        let cell = &rows[0].cells[0];
        assert_eq!(cell.x, 180.0);
        assert_eq!(cell.width, 60.0);
        assert_eq!(cell.airing, Airing::Live);
        assert!((cell.progress - 0.5).abs() < 1e-9);

        let flagged: Vec<_> = rows
            .iter()
            .filter(|r| r.cells.iter().any(|c| c.has_notification))
            .map(|r| r.channel_id.as_str())
            .collect();
        assert_eq!(flagged, vec!["ch101"]);
    }

    #[test]
    fn test_cells_clipped_to_timeline() {
        let list = channels(1);
        let mapper = TimelineMapper::new(DayKey::of(at(0)), 24, 10.0);
        let mut cache = ProgramCache::new();
        cache.merge_programs(
            "ch0",
            vec![Program {
                channel_id: String::new(),
                title: "Overnight".into(),
                description: String::new(),
                start: at(-2),
                stop: at(2),
            }],
            DayKey::of(at(0)),
        );
        let ctx = RowContext {
            mapper: &mapper,
            cache: &cache,
            notifications: &crate::collab::NoNotifications,
            now: at(5),
            row_height: 1.0,
        };
        let window = *compute_window(1, 1.0, 0, 0.0, 10.0).window().unwrap();
        let rows = build_rows(&list, &window, &ctx);
        let cell = &rows[0].cells[0];
        assert_eq!(cell.x, 0.0);
        assert_eq!(cell.width, 20.0);
        assert_eq!(cell.airing, Airing::Past);
    }
}
