//! Fuzzy search index over channels and over program titles in the
//! current guide window.
//!
//! Program titles are indexed only for programs overlapping the anchor
//! window, not the whole cache, which keeps rebuilds cheap as more days
//! load. The index is rebuilt wholesale on every finalize.

use chrono::{DateTime, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use guide_proto::model::{ProgramId, SearchScope};
use tracing::debug;

use crate::catalog::ChannelCatalog;
use crate::program_cache::ProgramCache;

pub const CHANNEL_RESULT_LIMIT: usize = 10;
pub const PROGRAM_RESULT_LIMIT: usize = 20;

struct ChannelEntry {
    channel_id: String,
    /// name, display name, source, channel number
    fields: Vec<String>,
}

struct ProgramEntry {
    channel_id: String,
    program_id: ProgramId,
    title: String,
    start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHit {
    pub channel_id: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramHit {
    pub channel_id: String,
    pub program_id: ProgramId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub score: i64,
}

/// Ranked results, best score first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub channels: Vec<ChannelHit>,
    pub programs: Vec<ProgramHit>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.programs.is_empty()
    }
}

pub struct SearchIndex {
    channels: Vec<ChannelEntry>,
    programs: Vec<ProgramEntry>,
    matcher: SkimMatcherV2,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            programs: Vec::new(),
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }
}

impl SearchIndex {
    /// Index every channel, plus programs overlapping `[from, to)`.
    pub fn build(
        catalog: &ChannelCatalog,
        cache: &ProgramCache,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Self {
        let mut index = Self::default();
        for channel in catalog.channels() {
            let mut fields = vec![channel.name.clone()];
            if !channel.display_name.is_empty() && channel.display_name != channel.name {
                fields.push(channel.display_name.clone());
            }
            if !channel.source.is_empty() {
                fields.push(channel.source.clone());
            }
            if let Some(chno) = channel.chno.as_ref().filter(|n| !n.is_empty()) {
                fields.push(chno.clone());
            }
            index.channels.push(ChannelEntry {
                channel_id: channel.id.clone(),
                fields,
            });

            index.programs.extend(cache.programs_in(&channel.id, from, to).map(|p| {
                ProgramEntry {
                    channel_id: channel.id.clone(),
                    program_id: p.id(),
                    title: p.title.clone(),
                    start: p.start,
                }
            }));
        }
        debug!(
            "[search] indexed {} channels, {} programs",
            index.channels.len(),
            index.programs.len()
        );
        index
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn search(&self, query: &str, scope: SearchScope) -> SearchResults {
        let query = query.trim();
        if query.is_empty() {
            return SearchResults::default();
        }

        let mut channels: Vec<ChannelHit> = self
            .channels
            .iter()
            .filter_map(|entry| {
                entry
                    .fields
                    .iter()
                    .filter_map(|f| self.matcher.fuzzy_match(f, query))
                    .max()
                    .map(|score| ChannelHit {
                        channel_id: entry.channel_id.clone(),
                        score,
                    })
            })
            .collect();
        channels.sort_by(|a, b| b.score.cmp(&a.score));
        channels.truncate(CHANNEL_RESULT_LIMIT);

        let mut programs = Vec::new();
        if scope.includes_programs() {
            programs = self
                .programs
                .iter()
                .filter_map(|entry| {
                    self.matcher
                        .fuzzy_match(&entry.title, query)
                        .map(|score| ProgramHit {
                            channel_id: entry.channel_id.clone(),
                            program_id: entry.program_id,
                            title: entry.title.clone(),
                            start: entry.start,
                            score,
                        })
                })
                .collect();
            programs.sort_by(|a, b| b.score.cmp(&a.score).then(a.start.cmp(&b.start)));
            programs.truncate(PROGRAM_RESULT_LIMIT);
        }

        SearchResults { channels, programs }
    }
}
