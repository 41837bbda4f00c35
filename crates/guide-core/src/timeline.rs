//! Timeline coordinate mapper: wall-clock instants <-> horizontal pixels.
//!
//! `origin` is the earliest midnight among the anchor day and all loaded
//! days; `extent` is the later of `anchor + guide_duration_hours` and the end
//! of the last loaded day. Both are maintained from the first/last loaded
//! day alone, so every update is O(1) regardless of how many days loaded.

use chrono::{DateTime, Duration, Utc};
use guide_proto::model::DayKey;

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone)]
pub struct TimelineMapper {
    anchor: DayKey,
    duration_hours: u32,
    hour_width: f64,
    first_loaded: Option<DayKey>,
    last_loaded: Option<DayKey>,
    origin: DateTime<Utc>,
    extent: DateTime<Utc>,
}

impl TimelineMapper {
    pub fn new(anchor: DayKey, duration_hours: u32, hour_width: f64) -> Self {
        let mut mapper = Self {
            anchor,
            duration_hours: duration_hours.max(1),
            hour_width,
            first_loaded: None,
            last_loaded: None,
            origin: anchor.midnight(),
            extent: anchor.midnight(),
        };
        mapper.recompute();
        mapper
    }

    fn recompute(&mut self) {
        let anchor_start = self.anchor.midnight();
        let anchor_end = anchor_start + Duration::hours(i64::from(self.duration_hours));
        self.origin = match self.first_loaded {
            Some(day) => day.midnight().min(anchor_start),
            None => anchor_start,
        };
        self.extent = match self.last_loaded {
            Some(day) => day.end().max(anchor_end),
            None => anchor_end,
        };
    }

    /// Widen the bounds to cover `day`. Returns true when origin or extent
    /// moved.
    pub fn include_day(&mut self, day: DayKey) -> bool {
        let (origin, extent) = (self.origin, self.extent);
        self.first_loaded = Some(self.first_loaded.map_or(day, |d| d.min(day)));
        self.last_loaded = Some(self.last_loaded.map_or(day, |d| d.max(day)));
        self.recompute();
        origin != self.origin || extent != self.extent
    }

    /// Reset loaded bounds from a full day list (warm start / reset only).
    pub fn reset_loaded(&mut self, days: &[DayKey]) {
        self.first_loaded = days.iter().min().copied();
        self.last_loaded = days.iter().max().copied();
        self.recompute();
    }

    pub fn set_anchor(&mut self, anchor: DayKey) {
        self.anchor = anchor;
        self.recompute();
    }

    pub fn set_duration_hours(&mut self, hours: u32) {
        self.duration_hours = hours.max(1);
        self.recompute();
    }

    pub fn set_hour_width(&mut self, hour_width: f64) {
        if hour_width > 0.0 {
            self.hour_width = hour_width;
        }
    }

    pub fn anchor(&self) -> DayKey {
        self.anchor
    }

    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    pub fn extent(&self) -> DateTime<Utc> {
        self.extent
    }

    pub fn hour_width(&self) -> f64 {
        self.hour_width
    }

    /// The anchor's guide window `[anchor midnight, + duration)`.
    pub fn anchor_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.anchor.midnight();
        (start, start + Duration::hours(i64::from(self.duration_hours)))
    }

    pub fn time_to_x(&self, t: DateTime<Utc>) -> f64 {
        let ms = (t - self.origin).num_milliseconds() as f64;
        ms / MS_PER_HOUR * self.hour_width
    }

    pub fn x_to_time(&self, x: f64) -> DateTime<Utc> {
        let ms = (x / self.hour_width * MS_PER_HOUR).round() as i64;
        self.origin + Duration::milliseconds(ms)
    }

    /// Full scrollable width of the timeline.
    pub fn total_width(&self) -> f64 {
        self.time_to_x(self.extent)
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.origin <= t && t < self.extent
    }

    pub fn first_day(&self) -> DayKey {
        DayKey::of(self.origin)
    }

    /// Day holding the last covered instant.
    pub fn last_day(&self) -> DayKey {
        DayKey::of(self.extent - Duration::milliseconds(1))
    }

    /// Day under horizontal offset `x`.
    pub fn day_at(&self, x: f64) -> DayKey {
        if x >= self.total_width() {
            return self.last_day();
        }
        DayKey::of(self.x_to_time(x.max(0.0)))
    }

    /// Time range shown by a viewport, clamped to `[origin, extent]`.
    pub fn visible_range(&self, scroll_left: f64, viewport_width: f64) -> (DateTime<Utc>, DateTime<Utc>) {
        let total = self.total_width();
        let left = scroll_left.clamp(0.0, total);
        let right = (scroll_left + viewport_width.max(0.0)).clamp(left, total);
        (self.x_to_time(left), self.x_to_time(right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DayKey {
        DayKey::of(Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_initial_window_from_anchor() {
        let m = TimelineMapper::new(day(10), 48, 100.0);
        assert_eq!(m.origin(), day(10).midnight());
        assert_eq!(m.extent(), day(12).midnight());
        assert_eq!(m.total_width(), 4800.0);
        assert_eq!(m.last_day(), day(11));
        assert_eq!(m.day_at(2400.0), day(11));
        assert_eq!(m.day_at(1e9), day(11));
    }

    #[test]
    fn test_time_to_x_and_back() {
        let m = TimelineMapper::new(day(10), 48, 120.0);
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 13, 30, 0).unwrap();
        assert!((m.time_to_x(t) - 13.5 * 120.0).abs() < 1e-9);
        assert_eq!(m.x_to_time(13.5 * 120.0), t);

        let mut p = 0.0;
        while p < m.total_width() {
            assert!((m.time_to_x(m.x_to_time(p)) - p).abs() < 1e-3);
            p += 37.25;
        }
    }

    #[test]
    fn test_include_day_expands_both_edges() {
        let mut m = TimelineMapper::new(day(10), 48, 10.0);
        assert!(!m.include_day(day(10)));
        assert!(m.include_day(day(12)));
        assert_eq!(m.extent(), day(13).midnight());

        assert!(m.include_day(day(9)));
        assert_eq!(m.origin(), day(9).midnight());
        // 4 days * 24h * 10px
        assert_eq!(m.total_width(), 960.0);
    }

    #[test]
    fn test_scale_change_keeps_bounds() {
        let mut m = TimelineMapper::new(day(10), 24, 10.0);
        m.include_day(day(11));
        m.set_hour_width(20.0);
        assert_eq!(m.origin(), day(10).midnight());
        assert_eq!(m.total_width(), 48.0 * 20.0);
        m.set_hour_width(0.0);
        assert_eq!(m.hour_width(), 20.0);
    }

    #[test]
    fn test_contains_is_half_open() {
        let m = TimelineMapper::new(day(10), 24, 10.0);
        assert!(m.contains(m.origin()));
        assert!(!m.contains(m.extent()));
    }

    #[test]
    fn test_visible_range_clamped() {
        let m = TimelineMapper::new(day(10), 24, 10.0);
        let (from, to) = m.visible_range(-50.0, 1000.0);
        assert_eq!(from, m.origin());
        assert_eq!(to, m.extent());
    }
}
