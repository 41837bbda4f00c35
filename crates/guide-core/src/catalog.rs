//! Channel catalog: the channel list plus derived favorite/recent flags.

use std::collections::{BTreeSet, HashMap};

use guide_proto::model::{Channel, GuideSettings};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ChannelCatalog {
    channels: Vec<Channel>,
    by_id: HashMap<String, usize>,
}

impl ChannelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the channel list. Later duplicates of an id are dropped and
    /// favorite flags are re-derived from `settings`. Returns the number of
    /// duplicates dropped.
    pub fn replace(&mut self, channels: Vec<Channel>, settings: &GuideSettings) -> usize {
        self.channels.clear();
        self.by_id.clear();
        let mut dropped = 0usize;
        for mut channel in channels {
            if self.by_id.contains_key(&channel.id) {
                dropped += 1;
                continue;
            }
            channel.is_favorite = settings.is_favorite(&channel.id);
            self.by_id.insert(channel.id.clone(), self.channels.len());
            self.channels.push(channel);
        }
        if dropped > 0 {
            debug!("[catalog] dropped {} duplicate channel ids", dropped);
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        self.by_id.clear();
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn get(&self, id: &str) -> Option<&Channel> {
        self.by_id.get(id).and_then(|&i| self.channels.get(i))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Flip the favorite flag in place and mirror it into settings.
    /// Returns the new flag, or `None` for an unknown channel.
    pub fn toggle_favorite(&mut self, id: &str, settings: &mut GuideSettings) -> Option<bool> {
        let idx = *self.by_id.get(id)?;
        let now_favorite = settings.toggle_favorite(id);
        self.channels[idx].is_favorite = now_favorite;
        Some(now_favorite)
    }

    /// Record a play: the channel moves to the front of recents.
    /// Unknown ids are ignored.
    pub fn record_played(&self, id: &str, settings: &mut GuideSettings) -> bool {
        if !self.by_id.contains_key(id) {
            return false;
        }
        settings.push_recent(id);
        true
    }

    pub fn favorites(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.is_favorite)
    }

    /// Recently played channels, most recent first. Ids that are no longer
    /// in the catalog are skipped.
    pub fn recents<'a>(&'a self, settings: &'a GuideSettings) -> impl Iterator<Item = &'a Channel> {
        settings.recent_channels.iter().filter_map(|id| self.get(id))
    }

    /// Distinct non-empty groups, sorted.
    pub fn groups(&self) -> Vec<String> {
        distinct_sorted(self.channels.iter().map(|c| c.group.as_str()))
    }

    /// Distinct non-empty sources, sorted.
    pub fn sources(&self) -> Vec<String> {
        distinct_sorted(self.channels.iter().map(|c| c.source.as_str()))
    }
}

fn distinct_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
