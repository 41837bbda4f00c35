//! Filter controller: derives the visible channel list.
//!
//! Pipeline, in order: group filter (explicit group, or the synthetic
//! "favorites"/"recents" groups), source filter, then free text. Free text
//! keeps channels whose display fields contain the query and puts the fuzzy
//! hits from the search index ahead of them, best score first.

use std::collections::HashSet;
use std::fmt;

use guide_proto::model::{Channel, GuideSettings};

use crate::catalog::ChannelCatalog;
use crate::search::{SearchIndex, SearchResults};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GroupFilter {
    #[default]
    All,
    Favorites,
    Recents,
    Group(String),
}

impl fmt::Display for GroupFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Favorites => write!(f, "favorites"),
            Self::Recents => write!(f, "recents"),
            Self::Group(g) => write!(f, "{}", g),
        }
    }
}

/// Filtered, ordered channels plus the search results that shaped them.
#[derive(Debug, Clone, Default)]
pub struct VisibleChannelList {
    pub channels: Vec<Channel>,
    pub search: SearchResults,
}

impl VisibleChannelList {
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn position(&self, channel_id: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.id == channel_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterController {
    pub group: GroupFilter,
    pub source: Option<String>,
    pub query: String,
}

impl FilterController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group dropdown: the synthetic groups, then real groups sorted.
    pub fn group_options(catalog: &ChannelCatalog) -> Vec<GroupFilter> {
        let mut options = vec![GroupFilter::All, GroupFilter::Favorites, GroupFilter::Recents];
        options.extend(catalog.groups().into_iter().map(GroupFilter::Group));
        options
    }

    pub fn source_options(catalog: &ChannelCatalog) -> Vec<String> {
        catalog.sources()
    }

    /// Step to the next group option, wrapping around.
    pub fn cycle_group(&mut self, catalog: &ChannelCatalog) {
        let options = Self::group_options(catalog);
        let pos = options.iter().position(|g| *g == self.group).unwrap_or(0);
        self.group = options[(pos + 1) % options.len()].clone();
    }

    /// Step through `None -> each source -> None`.
    pub fn cycle_source(&mut self, catalog: &ChannelCatalog) {
        let options = Self::source_options(catalog);
        self.source = match &self.source {
            None => options.first().cloned(),
            Some(current) => {
                let pos = options.iter().position(|s| s == current);
                pos.and_then(|p| options.get(p + 1)).cloned()
            }
        };
    }

    pub fn is_searching(&self) -> bool {
        !self.query.trim().is_empty()
    }

    pub fn apply(
        &self,
        catalog: &ChannelCatalog,
        settings: &GuideSettings,
        index: &SearchIndex,
    ) -> VisibleChannelList {
        let mut base: Vec<&Channel> = match &self.group {
            GroupFilter::All => catalog.channels().iter().collect(),
            GroupFilter::Favorites => catalog.favorites().collect(),
            GroupFilter::Recents => catalog.recents(settings).collect(),
            GroupFilter::Group(g) => catalog.channels().iter().filter(|c| &c.group == g).collect(),
        };
        if let Some(source) = &self.source {
            base.retain(|c| &c.source == source);
        }

        if !self.is_searching() {
            return VisibleChannelList {
                channels: base.into_iter().cloned().collect(),
                search: SearchResults::default(),
            };
        }

        let needle = self.query.trim().to_lowercase();
        let search = index.search(&self.query, settings.search_scope);

        let allowed: HashSet<&str> = base.iter().map(|c| c.id.as_str()).collect();
        let mut placed: HashSet<&str> = HashSet::new();
        let mut channels: Vec<Channel> = Vec::new();

        let ranked = search
            .channels
            .iter()
            .map(|h| h.channel_id.as_str())
            .chain(search.programs.iter().map(|h| h.channel_id.as_str()));
        for id in ranked {
            if !allowed.contains(id) || placed.contains(id) {
                continue;
            }
            if let Some(channel) = catalog.get(id) {
                placed.insert(&channel.id);
                channels.push(channel.clone());
            }
        }
        for channel in base {
            if !placed.contains(channel.id.as_str()) && substring_match(channel, &needle) {
                channels.push(channel.clone());
            }
        }

        VisibleChannelList { channels, search }
    }
}

fn substring_match(channel: &Channel, needle_lower: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(needle_lower);
    hit(&channel.name)
        || hit(&channel.display_name)
        || channel.chno.as_deref().is_some_and(hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guide_proto::model::SearchScope;

    fn ch(id: &str, name: &str, group: &str, source: &str) -> Channel {
        Channel {
            id: id.into(),
            name: name.into(),
            group: group.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    fn catalog(settings: &GuideSettings) -> ChannelCatalog {
        let mut c = ChannelCatalog::new();
        c.replace(
            vec![
                ch("A", "Alpha News", "News", "sat"),
                ch("B", "Bravo Sport", "Sports", "cable"),
                ch("C", "Charlie Kids", "Kids", "sat"),
            ],
            settings,
        );
        c
    }

    fn ids(list: &VisibleChannelList) -> Vec<&str> {
        list.channels.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_favorites_group() {
        let mut settings = GuideSettings::default();
        settings.favorites = vec!["B".into()];
        let catalog = catalog(&settings);
        let index = SearchIndex::default();
        let filter = FilterController {
            group: GroupFilter::Favorites,
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&catalog, &settings, &index)), vec!["B"]);
    }

    #[test]
    fn test_recents_keep_recency_order() {
        let mut settings = GuideSettings::default();
        settings.push_recent("A");
        settings.push_recent("C");
        let catalog = catalog(&settings);
        let filter = FilterController {
            group: GroupFilter::Recents,
            ..Default::default()
        };
        let list = filter.apply(&catalog, &settings, &SearchIndex::default());
        assert_eq!(ids(&list), vec!["C", "A"]);
    }

    #[test]
    fn test_group_then_source() {
        let settings = GuideSettings::default();
        let catalog = catalog(&settings);
        let mut filter = FilterController {
            source: Some("sat".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&catalog, &settings, &SearchIndex::default())), vec!["A", "C"]);
        filter.group = GroupFilter::Group("Kids".into());
        assert_eq!(ids(&filter.apply(&catalog, &settings, &SearchIndex::default())), vec!["C"]);
    }

    #[test]
    fn test_text_search_respects_group() {
        let mut settings = GuideSettings::default();
        settings.search_scope = SearchScope::ChannelsOnly;
        let catalog = catalog(&settings);
        let index = SearchIndex::build(
            &catalog,
            &crate::program_cache::ProgramCache::new(),
            chrono::Utc::now(),
            chrono::Utc::now(),
        );
        let mut filter = FilterController {
            query: "sport".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&catalog, &settings, &index)), vec!["B"]);

        filter.group = GroupFilter::Group("News".into());
        assert!(filter.apply(&catalog, &settings, &index).is_empty());
    }

    #[test]
    fn test_options_and_cycling() {
        let settings = GuideSettings::default();
        let catalog = catalog(&settings);
        let groups = FilterController::group_options(&catalog);
        assert_eq!(
            groups,
            vec![
                GroupFilter::All,
                GroupFilter::Favorites,
                GroupFilter::Recents,
                GroupFilter::Group("Kids".into()),
                GroupFilter::Group("News".into()),
                GroupFilter::Group("Sports".into()),
            ]
        );

        let mut filter = FilterController::new();
        filter.cycle_source(&catalog);
        assert_eq!(filter.source.as_deref(), Some("cable"));
        filter.cycle_source(&catalog);
        assert_eq!(filter.source.as_deref(), Some("sat"));
        filter.cycle_source(&catalog);
        assert_eq!(filter.source, None);

        for _ in 0..groups.len() {
            filter.cycle_group(&catalog);
        }
        assert_eq!(filter.group, GroupFilter::All);
    }
}
