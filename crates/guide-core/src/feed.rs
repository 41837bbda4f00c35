//! Feed client: the production ingestion collaborator.
//!
//! A feed is either an `http(s)://` base URL or a local directory, with the
//! same layout in both cases:
//!
//! ```text
//! <source>/channels.json          [Channel, ...]
//! <source>/epg/<YYYY-MM-DD>.json  { "<channel id>": [Program, ...], ... }
//! ```
//!
//! A day with no listing (HTTP 404 / missing file) is an empty day, not an
//! error, so it gets marked loaded and is not refetched.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use guide_proto::config::FeedConfig;
use guide_proto::model::{Channel, DayKey};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::collab::{DayPayload, Ingest};

const CHANNELS_PATH: &str = "channels.json";

fn day_path(day: DayKey) -> String {
    format!("epg/{}.json", day)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Http(String),
    Dir(PathBuf),
}

impl FeedSource {
    pub fn parse(source: &str) -> Self {
        let trimmed = source.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Http(trimmed.trim_end_matches('/').to_string())
        } else {
            Self::Dir(PathBuf::from(trimmed))
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedClient {
    source: FeedSource,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        Self::with_source(
            FeedSource::parse(&config.source),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    pub fn with_source(source: FeedSource, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("epg-guide/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { source, client })
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    /// `Ok(None)` when the resource does not exist.
    async fn get_json<T: DeserializeOwned>(&self, rel: &str) -> Result<Option<T>> {
        match &self.source {
            FeedSource::Http(base) => {
                let url = format!("{}/{}", base, rel);
                let response = self
                    .client
                    .get(&url)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .with_context(|| format!("Failed to fetch {}", url))?;

                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    anyhow::bail!("{} returned status: {}", url, response.status());
                }
                let value = response
                    .json()
                    .await
                    .with_context(|| format!("Failed to parse {}", url))?;
                Ok(Some(value))
            }
            FeedSource::Dir(dir) => read_json_file(&dir.join(rel)).await,
        }
    }
}

async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

impl Ingest for FeedClient {
    async fn fetch_channels(&self) -> Result<Vec<Channel>> {
        let channels: Vec<Channel> = self
            .get_json(CHANNELS_PATH)
            .await?
            .with_context(|| format!("No channel list at {:?}", self.source))?;
        info!("Fetched {} channels", channels.len());
        Ok(channels)
    }

    async fn fetch_day(&self, day: DayKey) -> Result<DayPayload> {
        match self.get_json::<DayPayload>(&day_path(day)).await? {
            Some(payload) => {
                debug!("Fetched {} ({} channels)", day, payload.len());
                Ok(payload)
            }
            None => {
                debug!("No listing for {}, treating as empty", day);
                Ok(DayPayload::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day() -> DayKey {
        DayKey::new(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
    }

    fn dir_client(dir: &Path) -> FeedClient {
        FeedClient::with_source(FeedSource::Dir(dir.to_path_buf()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            FeedSource::parse("https://epg.example.org/feed/"),
            FeedSource::Http("https://epg.example.org/feed".into())
        );
        assert_eq!(
            FeedSource::parse("/srv/feed"),
            FeedSource::Dir(PathBuf::from("/srv/feed"))
        );
    }

    #[tokio::test]
    async fn test_directory_feed() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("channels.json"),
            r#"[{"id":"bbc1","name":"BBC One","group":"UK"},{"id":"cnn","name":"CNN"}]"#,
        )
        .unwrap();
        std::fs::create_dir_all(tmp.path().join("epg")).unwrap();
        std::fs::write(
            tmp.path().join("epg/2024-03-09.json"),
            r#"{"bbc1":[{"title":"News","start":"2024-03-09T18:00:00Z","stop":"2024-03-09T18:30:00Z"}]}"#,
        )
        .unwrap();

        let client = dir_client(tmp.path());
        let channels = client.fetch_channels().await.unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].group, "UK");

        let payload = client.fetch_day(day()).await.unwrap();
        assert_eq!(payload["bbc1"][0].title, "News");
    }

    #[tokio::test]
    async fn test_missing_day_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let payload = dir_client(tmp.path()).fetch_day(day()).await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_missing_channels_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(dir_client(tmp.path()).fetch_channels().await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_day_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("epg")).unwrap();
        std::fs::write(tmp.path().join("epg/2024-03-09.json"), "{ nope").unwrap();
        let err = dir_client(tmp.path()).fetch_day(day()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }
}
