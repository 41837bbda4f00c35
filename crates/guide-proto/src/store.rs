//! File-backed stores: user settings and warm-start snapshots.
//!
//! Both stores are forgiving on read: a missing or unreadable file means
//! "start fresh", never an error that blocks the guide from opening.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Channel, DayKey, GuideSettings, Program, SearchScope, RECENTS_LIMIT};

/// The subset of `GuideSettings` that survives a restart.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistentSettings {
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default)]
    pub recent_channels: Vec<String>,
    #[serde(default)]
    pub current_date: Option<DayKey>,
    #[serde(default)]
    pub search_scope: Option<SearchScope>,
}

impl PersistentSettings {
    pub fn from_settings(settings: &GuideSettings) -> Self {
        Self {
            favorites: settings.favorites.clone(),
            recent_channels: settings.recent_channels.clone(),
            current_date: Some(settings.current_date),
            search_scope: Some(settings.search_scope),
        }
    }

    /// Layer persisted values over config-derived settings.
    pub fn apply_to(self, settings: &mut GuideSettings) {
        settings.favorites = self.favorites;
        settings.recent_channels = self.recent_channels;
        settings.recent_channels.truncate(RECENTS_LIMIT);
        if let Some(date) = self.current_date {
            settings.current_date = date;
        }
        if let Some(scope) = self.search_scope {
            settings.search_scope = scope;
        }
    }
}

pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> PersistentSettings {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return PersistentSettings::default();
        };
        match serde_json::from_str::<PersistentSettings>(&content) {
            Ok(s) => s,
            Err(e) => {
                warn!("[settings] ignoring unreadable {}: {}", self.path.display(), e);
                PersistentSettings::default()
            }
        }
    }

    pub fn save(&self, settings: &GuideSettings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&PersistentSettings::from_settings(settings))?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

pub const CHANNELS_KEY: &str = "channels.json";
pub const PROGRAMS_KEY: &str = "programs.json";
pub const LOADED_DATES_KEY: &str = "loaded_dates.json";

/// Everything needed to warm-start a session without the network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuideSnapshot {
    pub channels: Vec<Channel>,
    pub programs: BTreeMap<String, Vec<Program>>,
    pub loaded_dates: Vec<DayKey>,
}

impl GuideSnapshot {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Snapshot directory with one JSON file per fixed key.
pub struct SnapshotDir {
    dir: PathBuf,
}

impl SnapshotDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save(&self, snapshot: &GuideSnapshot) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        self.write_key(CHANNELS_KEY, &snapshot.channels)?;
        self.write_key(PROGRAMS_KEY, &snapshot.programs)?;
        self.write_key(LOADED_DATES_KEY, &snapshot.loaded_dates)?;
        debug!(
            "[snapshot] saved {} channels, {} program lists, {} days",
            snapshot.channels.len(),
            snapshot.programs.len(),
            snapshot.loaded_dates.len()
        );
        Ok(())
    }

    /// Returns `None` when any key is missing or unreadable; a partial
    /// snapshot is treated as no snapshot.
    pub fn load(&self) -> Option<GuideSnapshot> {
        let channels = self.read_key::<Vec<Channel>>(CHANNELS_KEY)?;
        let programs = self.read_key::<BTreeMap<String, Vec<Program>>>(PROGRAMS_KEY)?;
        let loaded_dates = self.read_key::<Vec<DayKey>>(LOADED_DATES_KEY)?;
        Some(GuideSnapshot {
            channels,
            programs,
            loaded_dates,
        })
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        for key in [CHANNELS_KEY, PROGRAMS_KEY, LOADED_DATES_KEY] {
            let path = self.dir.join(key);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn write_key<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let path = self.dir.join(key);
        let json = serde_json::to_vec(value)?;
        // Write-then-rename so a crash never leaves a half-written key.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read_key<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let path = self.dir.join(key);
        let content = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&content) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("[snapshot] discarding {}: {}", path.display(), e);
                None
            }
        }
    }
}
