use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::model::{GuideSettings, SearchScope};
use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub guide: GuideConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Layout and timing knobs for the guide grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideConfig {
    #[serde(default = "default_guide_duration_hours")]
    pub guide_duration_hours: u32,
    /// Pixels per hour. In the terminal adapter a pixel is one cell.
    #[serde(default = "default_hour_width")]
    pub hour_width: f64,
    #[serde(default = "default_channel_column_width")]
    pub channel_column_width: u16,
    #[serde(default = "default_row_height")]
    pub row_height: f64,
    /// Extra rows materialized above and below the viewport.
    #[serde(default = "default_overscan")]
    pub overscan: usize,
    /// Fraction of the scrollable width that counts as "near the edge".
    #[serde(default = "default_edge_fraction")]
    pub edge_fraction: f64,
    #[serde(default = "default_now_line_period_secs")]
    pub now_line_period_secs: u64,
    /// Scroll/resize handlers run at most once per budget.
    #[serde(default = "default_frame_budget_ms")]
    pub frame_budget_ms: u64,
    #[serde(default)]
    pub search_scope: SearchScope,
}

/// Where channels and day listings come from: either an https:// base URL
/// or a local directory with the same layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_source")]
    pub source: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the warm-start snapshots.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Favorites, recents and the last anchor date.
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
    /// Reminder keys written by the notification service; read-only here.
    #[serde(default = "default_notifications_file")]
    pub notifications_file: PathBuf,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            guide_duration_hours: default_guide_duration_hours(),
            hour_width: default_hour_width(),
            channel_column_width: default_channel_column_width(),
            row_height: default_row_height(),
            overscan: default_overscan(),
            edge_fraction: default_edge_fraction(),
            now_line_period_secs: default_now_line_period_secs(),
            frame_budget_ms: default_frame_budget_ms(),
            search_scope: SearchScope::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: default_feed_source(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            settings_file: default_settings_file(),
            notifications_file: default_notifications_file(),
        }
    }
}

fn default_guide_duration_hours() -> u32 {
    48
}

fn default_hour_width() -> f64 {
    24.0
}

fn default_channel_column_width() -> u16 {
    22
}

fn default_row_height() -> f64 {
    2.0
}

fn default_overscan() -> usize {
    4
}

fn default_edge_fraction() -> f64 {
    0.15
}

fn default_now_line_period_secs() -> u64 {
    60
}

fn default_frame_budget_ms() -> u64 {
    16
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_feed_source() -> String {
    platform::data_dir().join("feed").display().to_string()
}

fn default_cache_dir() -> PathBuf {
    platform::cache_dir().join("snapshots")
}

fn default_settings_file() -> PathBuf {
    platform::data_dir().join("settings.json")
}

fn default_notifications_file() -> PathBuf {
    platform::data_dir().join("reminders.json")
}

impl GuideConfig {
    /// Seed runtime settings from config. Persisted favorites/recents are
    /// layered on top by the settings store.
    pub fn to_settings(&self) -> GuideSettings {
        GuideSettings {
            guide_duration_hours: self.guide_duration_hours.max(1),
            hour_width: if self.hour_width > 0.0 {
                self.hour_width
            } else {
                default_hour_width()
            },
            channel_column_width: self.channel_column_width,
            search_scope: self.search_scope,
            ..GuideSettings::default()
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
