//! Record shapes shared by the guide core, the feed client and the stores.
//!
//! The core never parses a source format: it receives `Channel` and
//! `Program` values already built by the ingestion side.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of recently played channel ids kept in settings.
pub const RECENTS_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Channel {
    /// Stable, unique id. Everything else keys off this.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub logo: String,
    /// Group / category the channel is listed under (may be empty).
    #[serde(default)]
    pub group: String,
    /// Playlist or provider the channel came from (may be empty).
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub chno: Option<String>,
    /// Opaque stream locator, never interpreted here.
    #[serde(default)]
    pub url: String,
    /// Derived from settings on every catalog load; never persisted.
    #[serde(skip)]
    pub is_favorite: bool,
}

impl Channel {
    /// Name shown in the channel column: display name when set.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Owning channel. Day payloads are keyed by channel, so the feed may
    /// leave this empty; the cache fills it in on merge.
    #[serde(default)]
    pub channel_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl Program {
    pub fn id(&self) -> ProgramId {
        ProgramId::from_start(self.start)
    }

    /// Activity window is half-open: `[start, stop)`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.stop
    }

    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start < to && self.stop > from
    }
}

/// Program identity within a channel. Two programs on the same channel
/// with the same start instant are the same program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(pub i64);

impl ProgramId {
    pub fn from_start(start: DateTime<Utc>) -> Self {
        Self(start.timestamp_millis())
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar day, used as the unit of fetching. Midnight is taken in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(pub NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn of(t: DateTime<Utc>) -> Self {
        Self(t.date_naive())
    }

    pub fn today() -> Self {
        Self::of(Utc::now())
    }

    pub fn midnight(&self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after this day.
    pub fn end(&self) -> DateTime<Utc> {
        self.midnight() + Duration::days(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + Duration::days(1))
    }

    pub fn prev(&self) -> Self {
        Self(self.0 - Duration::days(1))
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(Self(NaiveDate::parse_from_str(s, "%Y-%m-%d")?))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Whether free-text search also looks at program titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    ChannelsOnly,
    #[default]
    ChannelsAndPrograms,
}

impl SearchScope {
    pub fn includes_programs(self) -> bool {
        matches!(self, Self::ChannelsAndPrograms)
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::ChannelsOnly => Self::ChannelsAndPrograms,
            Self::ChannelsAndPrograms => Self::ChannelsOnly,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ChannelsOnly => "channels",
            Self::ChannelsAndPrograms => "channels+programs",
        }
    }
}

/// Settings the guide reads on every pass. Favorites and recents are the
/// only fields written back.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideSettings {
    /// Initial window size, starting at the anchor day's midnight.
    pub guide_duration_hours: u32,
    /// Horizontal scale: pixels (or cells) per hour.
    pub hour_width: f64,
    pub channel_column_width: u16,
    /// Anchor day the guide view is centered on.
    pub current_date: DayKey,
    pub favorites: Vec<String>,
    /// Most-recent-first, de-duplicated, at most `RECENTS_LIMIT` ids.
    pub recent_channels: Vec<String>,
    pub search_scope: SearchScope,
}

impl Default for GuideSettings {
    fn default() -> Self {
        Self {
            guide_duration_hours: 48,
            hour_width: 24.0,
            channel_column_width: 22,
            current_date: DayKey::today(),
            favorites: Vec::new(),
            recent_channels: Vec::new(),
            search_scope: SearchScope::default(),
        }
    }
}

impl GuideSettings {
    /// Move `channel_id` to the front of the recents list.
    pub fn push_recent(&mut self, channel_id: &str) {
        self.recent_channels.retain(|id| id != channel_id);
        self.recent_channels.insert(0, channel_id.to_string());
        self.recent_channels.truncate(RECENTS_LIMIT);
    }

    pub fn is_favorite(&self, channel_id: &str) -> bool {
        self.favorites.iter().any(|id| id == channel_id)
    }

    /// Flip favorite membership; returns the new state.
    pub fn toggle_favorite(&mut self, channel_id: &str) -> bool {
        if self.is_favorite(channel_id) {
            self.favorites.retain(|id| id != channel_id);
            false
        } else {
            self.favorites.push(channel_id.to_string());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_recents_are_bounded_and_deduplicated() {
        let mut s = GuideSettings::default();
        for i in 0..20 {
            s.push_recent(&format!("ch{}", i));
        }
        s.push_recent("ch10");
        assert_eq!(s.recent_channels.len(), RECENTS_LIMIT);
        assert_eq!(s.recent_channels[0], "ch10");
        assert_eq!(s.recent_channels[1], "ch19");
        assert_eq!(
            s.recent_channels.iter().filter(|id| *id == "ch10").count(),
            1
        );
    }

    #[test]
    fn test_toggle_favorite() {
        let mut s = GuideSettings::default();
        assert!(s.toggle_favorite("bbc1"));
        assert!(s.is_favorite("bbc1"));
        assert!(!s.toggle_favorite("bbc1"));
        assert!(s.favorites.is_empty());
    }

    #[test]
    fn test_live_interval_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();
        let p = Program {
            channel_id: "a".into(),
            title: "News".into(),
            description: String::new(),
            start,
            stop,
        };
        assert!(p.is_live_at(start));
        assert!(!p.is_live_at(stop));
    }

    #[test]
    fn test_day_key_navigation() {
        let d = DayKey::parse("2024-02-28").unwrap();
        assert_eq!(d.next().to_string(), "2024-02-29");
        assert_eq!(d.next().next().to_string(), "2024-03-01");
        assert_eq!(d.prev().to_string(), "2024-02-27");
        assert_eq!(d.end(), d.next().midnight());
    }

    #[test]
    fn test_channel_label_prefers_display_name() {
        let mut c = Channel {
            id: "x".into(),
            name: "raw name".into(),
            ..Default::default()
        };
        assert_eq!(c.label(), "raw name");
        c.display_name = "Pretty".into();
        assert_eq!(c.label(), "Pretty");
    }
}
