//! Date range loader: grows the guide's time span as the viewer scrolls
//! toward either horizontal edge.
//!
//! One load at a time. A proximity trigger that arrives while a load is in
//! flight is dropped, but remembered: when the load completes the caller is
//! told to re-check proximity once, so a fast scroll past the threshold
//! cannot strand the view without its next day.

use chrono::{DateTime, Utc};
use guide_proto::model::DayKey;
use tracing::{debug, info, trace, warn};

use crate::collab::DayPayload;
use crate::error::GuideError;
use crate::program_cache::{MergeReport, ProgramCache};
use crate::timeline::TimelineMapper;

pub const DEFAULT_EDGE_FRACTION: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

/// A day fetch the caller should perform. `generation` identifies the view
/// context the request was made in. `edge` is `None` for days requested
/// directly (filling the anchor window) rather than by scroll proximity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRequest {
    pub day: DayKey,
    pub edge: Option<Edge>,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub day: DayKey,
    pub report: MergeReport,
    /// Scroll offset that keeps the anchored content in place.
    pub scroll_left: f64,
    /// The view context changed while the fetch was in flight.
    pub stale: bool,
    /// A trigger was dropped during the fetch; check proximity again.
    pub recheck: bool,
}

#[derive(Debug)]
pub struct DateRangeLoader {
    edge_fraction: f64,
    in_flight: Option<DayRequest>,
    dropped_while_loading: bool,
}

impl Default for DateRangeLoader {
    fn default() -> Self {
        Self::new(DEFAULT_EDGE_FRACTION)
    }
}

impl DateRangeLoader {
    pub fn new(edge_fraction: f64) -> Self {
        Self {
            edge_fraction: edge_fraction.clamp(0.0, 0.5),
            in_flight: None,
            dropped_while_loading: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<DayRequest> {
        self.in_flight
    }

    /// Which edge, if any, the viewport is close to. The end edge wins
    /// when both are (timeline narrower than the threshold band).
    pub fn near_edge(&self, scroll_left: f64, viewport_width: f64, total_width: f64) -> Option<Edge> {
        if total_width <= 0.0 {
            return None;
        }
        let threshold = total_width * self.edge_fraction;
        if scroll_left + viewport_width >= total_width - threshold {
            Some(Edge::End)
        } else if scroll_left <= threshold {
            Some(Edge::Start)
        } else {
            None
        }
    }

    /// Horizontal scroll handler. Returns the day to fetch and marks the
    /// loader busy, or `None` when nothing should be fetched.
    pub fn on_scroll(
        &mut self,
        scroll_left: f64,
        viewport_width: f64,
        mapper: &TimelineMapper,
        cache: &ProgramCache,
        generation: u64,
    ) -> Option<DayRequest> {
        let edge = self.near_edge(scroll_left, viewport_width, mapper.total_width())?;

        if self.in_flight.is_some() {
            trace!("[loader] {:?} trigger dropped, load in flight", edge);
            self.dropped_while_loading = true;
            return None;
        }

        let day = match edge {
            Edge::End => mapper.last_day().next(),
            Edge::Start => mapper.first_day().prev(),
        };
        self.begin(day, Some(edge), cache, generation)
    }

    /// Request a specific day, subject to the same single-flight rule.
    pub fn request(&mut self, day: DayKey, cache: &ProgramCache, generation: u64) -> Option<DayRequest> {
        if self.in_flight.is_some() {
            trace!("[loader] request for {} dropped, load in flight", day);
            self.dropped_while_loading = true;
            return None;
        }
        self.begin(day, None, cache, generation)
    }

    fn begin(
        &mut self,
        day: DayKey,
        edge: Option<Edge>,
        cache: &ProgramCache,
        generation: u64,
    ) -> Option<DayRequest> {
        if cache.is_date_loaded(day) {
            return None;
        }
        let request = DayRequest {
            day,
            edge,
            generation,
        };
        self.in_flight = Some(request);
        match edge {
            Some(edge) => info!("[loader] requesting {} ({:?} edge)", day, edge),
            None => info!("[loader] requesting {}", day),
        }
        Some(request)
    }

    /// Apply a finished fetch.
    ///
    /// On success the day is merged, the timeline widened, and the scroll
    /// offset is shifted by exactly the width the expansion added before the
    /// viewport. On failure the cache is untouched and the day stays
    /// unloaded so a later trigger retries it.
    pub fn complete(
        &mut self,
        request: DayRequest,
        result: anyhow::Result<DayPayload>,
        cache: &mut ProgramCache,
        mapper: &mut TimelineMapper,
        scroll_left: f64,
        current_generation: u64,
    ) -> Result<LoadOutcome, GuideError> {
        if self.in_flight == Some(request) {
            self.in_flight = None;
        }
        let recheck = std::mem::take(&mut self.dropped_while_loading);

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[loader] {} failed: {:#}", request.day, e);
                return Err(GuideError::FetchFailure {
                    day: request.day,
                    reason: format!("{:#}", e),
                });
            }
        };

        let anchored: DateTime<Utc> = mapper.x_to_time(scroll_left);
        let width_before = mapper.total_width();
        let report = cache.merge_day(request.day, payload);
        mapper.include_day(request.day);

        let scroll_left = mapper.time_to_x(anchored);
        let stale = request.generation != current_generation;
        if stale {
            debug!(
                "[loader] {} arrived for a stale view (gen {} != {})",
                request.day, request.generation, current_generation
            );
        }
        debug!(
            "[loader] {} merged, width {:.0} -> {:.0}",
            request.day,
            width_before,
            mapper.total_width()
        );

        Ok(LoadOutcome {
            day: request.day,
            report,
            scroll_left,
            stale,
            recheck,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use guide_proto::model::Program;

    fn d0() -> DayKey {
        DayKey::of(Utc.with_ymd_and_hms(2024, 8, 5, 0, 0, 0).unwrap())
    }

    /// One loaded day (24h) at 10px/hour: total width 240.
    fn setup() -> (TimelineMapper, ProgramCache) {
        let mut mapper = TimelineMapper::new(d0(), 24, 10.0);
        let mut cache = ProgramCache::new();
        cache.merge_day(d0(), DayPayload::new());
        mapper.include_day(d0());
        (mapper, cache)
    }

    fn payload_for(day: DayKey) -> DayPayload {
        let start = day.midnight() + Duration::hours(6);
        [(
            "ch1".to_string(),
            vec![Program {
                channel_id: String::new(),
                title: "Morning".into(),
                description: String::new(),
                start,
                stop: start + Duration::hours(3),
            }],
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_near_edge_thresholds() {
        let loader = DateRangeLoader::default();
        // threshold = 36px of 240
        assert_eq!(loader.near_edge(100.0, 50.0, 240.0), None);
        assert_eq!(loader.near_edge(36.0, 50.0, 240.0), Some(Edge::Start));
        assert_eq!(loader.near_edge(160.0, 50.0, 240.0), Some(Edge::End));
        assert_eq!(loader.near_edge(0.0, 10.0, 0.0), None);
    }

    #[test]
    fn test_burst_fires_once() {
        let (mapper, cache) = setup();
        let mut loader = DateRangeLoader::default();
        let mut fired = Vec::new();
        for i in 0..10 {
            if let Some(req) = loader.on_scroll(170.0 + i as f64, 50.0, &mapper, &cache, 0) {
                fired.push(req);
            }
        }
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].day, d0().next());
        assert_eq!(fired[0].edge, Some(Edge::End));
        assert!(loader.is_loading());
    }

    #[test]
    fn test_append_keeps_scroll_and_flags_recheck() {
        let (mut mapper, mut cache) = setup();
        let mut loader = DateRangeLoader::default();
        let req = loader.on_scroll(180.0, 50.0, &mapper, &cache, 0).unwrap();
        assert!(loader.on_scroll(185.0, 50.0, &mapper, &cache, 0).is_none());

        let outcome = loader
            .complete(req, Ok(payload_for(req.day)), &mut cache, &mut mapper, 185.0, 0)
            .unwrap();
        assert_eq!(outcome.scroll_left, 185.0);
        assert!(!outcome.stale);
        assert!(outcome.recheck);
        assert_eq!(outcome.report.inserted, 1);
        assert!(cache.is_date_loaded(req.day));
        assert_eq!(mapper.total_width(), 480.0);
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_prepend_shifts_scroll_by_added_width() {
        let (mut mapper, mut cache) = setup();
        let mut loader = DateRangeLoader::default();
        let req = loader.on_scroll(20.0, 50.0, &mapper, &cache, 3).unwrap();
        assert_eq!(req.day, d0().prev());
        assert_eq!(req.edge, Some(Edge::Start));

        let width_before = mapper.total_width();
        let outcome = loader
            .complete(req, Ok(DayPayload::new()), &mut cache, &mut mapper, 20.0, 3)
            .unwrap();
        let delta = mapper.total_width() - width_before;
        assert_eq!(delta, 240.0);
        assert_eq!(outcome.scroll_left, 20.0 + delta);
        assert!(!outcome.recheck);
        // Empty day still counts as loaded.
        assert!(cache.is_date_loaded(d0().prev()));
    }

    #[test]
    fn test_failure_leaves_day_retryable() {
        let (mut mapper, mut cache) = setup();
        let mut loader = DateRangeLoader::default();
        let req = loader.on_scroll(200.0, 50.0, &mapper, &cache, 0).unwrap();
        let err = loader
            .complete(
                req,
                Err(anyhow::anyhow!("connection reset")),
                &mut cache,
                &mut mapper,
                200.0,
                0,
            )
            .unwrap_err();
        assert!(err.is_transient());
        assert!(!cache.is_date_loaded(req.day));
        assert_eq!(mapper.total_width(), 240.0);

        let retry = loader.on_scroll(200.0, 50.0, &mapper, &cache, 0);
        assert_eq!(retry.map(|r| r.day), Some(req.day));
    }

    #[test]
    fn test_stale_prepend_still_compensates_origin() {
        let (mut mapper, mut cache) = setup();
        let mut loader = DateRangeLoader::default();
        let req = loader.on_scroll(10.0, 50.0, &mapper, &cache, 1).unwrap();
        assert_eq!(req.edge, Some(Edge::Start));
        let anchored = mapper.x_to_time(10.0);
        let outcome = loader
            .complete(req, Ok(payload_for(req.day)), &mut cache, &mut mapper, 10.0, 2)
            .unwrap();
        assert!(outcome.stale);
        assert_eq!(outcome.scroll_left, 250.0);
        assert_eq!(mapper.x_to_time(outcome.scroll_left), anchored);
        assert_eq!(cache.programs("ch1").len(), 1);
    }

    #[test]
    fn test_loaded_neighbor_is_not_refetched() {
        let (mapper, mut cache) = setup();
        // Cached but not yet reflected in the mapper.
        cache.merge_day(d0().next(), DayPayload::new());
        let mut loader = DateRangeLoader::default();
        assert_eq!(loader.on_scroll(230.0, 10.0, &mapper, &cache, 0), None);
        assert!(!loader.is_loading());

        let req = loader.on_scroll(0.0, 10.0, &mapper, &cache, 0).unwrap();
        assert_eq!(req.day, d0().prev());
    }

    #[test]
    fn test_direct_request_shares_single_flight() {
        let (mapper, cache) = setup();
        let mut loader = DateRangeLoader::default();
        let first = loader.request(d0().next(), &cache, 0).unwrap();
        assert_eq!(first.edge, None);
        assert_eq!(loader.on_scroll(0.0, 10.0, &mapper, &cache, 0), None);
        assert_eq!(loader.request(d0().next().next(), &cache, 0), None);
        assert_eq!(loader.request(d0(), &cache, 0), None);
    }
}
