//! Program cache: per-channel program lists merged from dated fetches.
//!
//! Invariants held after every merge:
//!   - each channel's list is strictly ascending by `start`
//!   - no two programs on a channel share a `start`
//!   - every merged day key is in the loaded set, even if it brought nothing

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use guide_proto::model::{DayKey, Program};
use tracing::debug;

use crate::collab::DayPayload;

/// Longest program `programs_in` looks back for.
pub const MAX_PROGRAM_HOURS: i64 = 24;

/// Outcome of one merge. `conflicts` counts duplicates whose fields
/// differed from the program already cached; they are dropped all the same.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub conflicts: usize,
}

impl MergeReport {
    fn absorb(&mut self, other: MergeReport) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.conflicts += other.conflicts;
    }
}

#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<String, Vec<Program>>,
    loaded: HashSet<DayKey>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `incoming` into the channel's list. On a duplicate start the
    /// program already cached (or the earlier one in `incoming`) wins.
    pub fn merge_programs(
        &mut self,
        channel_id: &str,
        incoming: Vec<Program>,
        day: DayKey,
    ) -> MergeReport {
        self.loaded.insert(day);
        let mut report = MergeReport::default();
        if incoming.is_empty() {
            return report;
        }

        let list = self.programs.entry(channel_id.to_string()).or_default();
        let before = list.len();
        list.extend(incoming.into_iter().map(|mut p| {
            p.channel_id = channel_id.to_string();
            p
        }));
        // Stable: among equal starts, cached entries stay ahead of new ones.
        list.sort_by_key(|p| p.start);
        let mut duplicates = 0usize;
        let mut conflicts = 0usize;
        list.dedup_by(|later, kept| {
            if later.start != kept.start {
                return false;
            }
            duplicates += 1;
            if later != kept {
                conflicts += 1;
            }
            true
        });
        report.inserted = list.len() - before;
        report.duplicates = duplicates;
        report.conflicts = conflicts;

        if conflicts > 0 {
            debug!(
                "[cache] {}: kept first-seen for {} conflicting duplicate(s) on {}",
                channel_id, conflicts, day
            );
        }
        report
    }

    /// Merge a whole day's payload. The day is marked loaded even when the
    /// payload is empty so genuinely empty days are not refetched.
    pub fn merge_day(&mut self, day: DayKey, payload: DayPayload) -> MergeReport {
        self.loaded.insert(day);
        let mut total = MergeReport::default();
        for (channel_id, programs) in payload {
            total.absorb(self.merge_programs(&channel_id, programs, day));
        }
        debug!(
            "[cache] merged {}: +{} programs ({} duplicates)",
            day, total.inserted, total.duplicates
        );
        total
    }

    pub fn is_date_loaded(&self, day: DayKey) -> bool {
        self.loaded.contains(&day)
    }

    /// Loaded days in ascending order.
    pub fn loaded_days(&self) -> Vec<DayKey> {
        let mut days: Vec<DayKey> = self.loaded.iter().copied().collect();
        days.sort();
        days
    }

    pub fn programs(&self, channel_id: &str) -> &[Program] {
        self.programs
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Programs on `channel_id` overlapping `[from, to)`, ascending.
    ///
    /// Programs that started before `from` are found by scanning back at
    /// most `MAX_PROGRAM_HOURS`, so overlapping listings are handled but a
    /// single program longer than that is clipped from the left.
    pub fn programs_in(
        &self,
        channel_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = &Program> {
        let list = self.programs(channel_id);
        let end = list.partition_point(|p| p.start < to);
        let lookback = from - Duration::hours(MAX_PROGRAM_HOURS);
        let begin = list[..end].partition_point(|p| p.start < lookback);
        list[begin..end]
            .iter()
            .filter(move |p| p.overlaps(from, to))
    }

    /// The program airing on `channel_id` at `t`, if any. With overlapping
    /// listings the one that started last wins.
    pub fn program_at(&self, channel_id: &str, t: DateTime<Utc>) -> Option<&Program> {
        self.programs_in(channel_id, t, t + Duration::seconds(1))
            .filter(|p| p.is_live_at(t))
            .last()
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    pub fn total_programs(&self) -> usize {
        self.programs.values().map(Vec::len).sum()
    }

    /// Full reset, used when the catalog is reloaded from scratch.
    pub fn clear(&mut self) {
        self.programs.clear();
        self.loaded.clear();
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<Program>> {
        self.programs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Rebuild from a warm-start snapshot. Lists go through the regular
    /// merge so a hand-edited or stale snapshot cannot break the ordering
    /// invariant.
    pub fn restore(&mut self, programs: BTreeMap<String, Vec<Program>>, days: &[DayKey]) {
        self.clear();
        for (channel_id, list) in programs {
            if list.is_empty() {
                continue;
            }
            let day = DayKey::of(list[0].start);
            self.merge_programs(&channel_id, list, day);
        }
        // Only the recorded days count as loaded, not the ones inferred above.
        self.loaded = days.iter().copied().collect();
    }
}
