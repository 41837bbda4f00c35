//! Boundaries to the collaborators the guide does not own: ingestion,
//! settings persistence, the durable snapshot cache and notification lookup.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;

use guide_proto::model::{Channel, DayKey, GuideSettings, Program, ProgramId};
use guide_proto::store::{GuideSnapshot, SettingsFile, SnapshotDir};
use serde::Deserialize;
use tracing::warn;

/// One day's listings: `channel_id -> programs`, in any order.
pub type DayPayload = HashMap<String, Vec<Program>>;

/// Supplies already-parsed records. Parsing and validation of the source
/// format happen behind this trait; failures surface as `Err` or as an
/// empty/partial payload.
pub trait Ingest {
    fn fetch_channels(&self) -> impl Future<Output = anyhow::Result<Vec<Channel>>> + Send;

    fn fetch_day(&self, day: DayKey) -> impl Future<Output = anyhow::Result<DayPayload>> + Send;
}

/// Receives favorites/recents updates.
pub trait SettingsSink {
    fn save_settings(&self, settings: &GuideSettings) -> anyhow::Result<()>;
}

impl SettingsSink for SettingsFile {
    fn save_settings(&self, settings: &GuideSettings) -> anyhow::Result<()> {
        self.save(settings)
    }
}

/// Durable cache used for warm starts.
pub trait SnapshotStore {
    fn save_snapshot(&self, snapshot: &GuideSnapshot) -> anyhow::Result<()>;
    fn load_snapshot(&self) -> Option<GuideSnapshot>;
    fn clear_snapshot(&self) -> anyhow::Result<()>;
}

impl SnapshotStore for SnapshotDir {
    fn save_snapshot(&self, snapshot: &GuideSnapshot) -> anyhow::Result<()> {
        self.save(snapshot)
    }

    fn load_snapshot(&self) -> Option<GuideSnapshot> {
        self.load()
    }

    fn clear_snapshot(&self) -> anyhow::Result<()> {
        self.clear()
    }
}

/// Presence check for a scheduled reminder on a program.
pub trait NotificationLookup {
    fn has_notification(&self, channel_id: &str, program: ProgramId) -> bool;
}

pub struct NoNotifications;

impl NotificationLookup for NoNotifications {
    fn has_notification(&self, _channel_id: &str, _program: ProgramId) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct ReminderEntry {
    channel_id: String,
    program_id: ProgramId,
}

/// Reminder keys as written by the notification service.
#[derive(Debug, Default, Clone)]
pub struct ReminderSet {
    by_channel: HashMap<String, HashSet<ProgramId>>,
}

impl ReminderSet {
    /// Missing or unreadable file means no reminders.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Vec<ReminderEntry>>(&content) {
            Ok(entries) => entries
                .into_iter()
                .map(|e| (e.channel_id, e.program_id))
                .collect(),
            Err(e) => {
                warn!("[reminders] ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_channel.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_channel.is_empty()
    }
}

impl FromIterator<(String, ProgramId)> for ReminderSet {
    fn from_iter<I: IntoIterator<Item = (String, ProgramId)>>(iter: I) -> Self {
        let mut by_channel: HashMap<String, HashSet<ProgramId>> = HashMap::new();
        for (channel_id, program) in iter {
            by_channel.entry(channel_id).or_default().insert(program);
        }
        Self { by_channel }
    }
}

impl NotificationLookup for ReminderSet {
    fn has_notification(&self, channel_id: &str, program: ProgramId) -> bool {
        self.by_channel
            .get(channel_id)
            .is_some_and(|ids| ids.contains(&program))
    }
}
