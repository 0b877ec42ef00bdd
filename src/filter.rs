// ABOUTME: Retrieval filters for Pocket items
// ABOUTME: Builds request parameters and re-checks, sorts and limits results

use crate::model::SavedItem;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// Pocket's pseudo-tag for items that carry no tag at all.
pub const UNTAGGED: &str = "_untagged_";

/// Conjunction of optional predicates. Unset fields never exclude items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Keep only the newest `count` items.
    pub count: Option<usize>,
    pub favorited: bool,
    pub archived: bool,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl Filter {
    /// Request parameters for `/v3/get`. Only set fields are emitted.
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("sort".into(), json!("newest"));
        params.insert("detailType".into(), json!("complete"));

        if let Some(count) = self.count.filter(|c| *c > 0) {
            params.insert("count".into(), json!(count));
        }
        if self.favorited {
            params.insert("favorite".into(), json!(1));
        }
        if self.archived {
            params.insert("state".into(), json!("archive"));
        }
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            params.insert("tag".into(), json!(tag));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.insert("search".into(), json!(search));
        }
        if let Some(since) = self.since {
            params.insert("since".into(), json!(since.timestamp()));
        }

        params
    }

    pub fn matches(&self, item: &SavedItem) -> bool {
        if self.favorited && !item.favorited {
            return false;
        }
        if self.archived && !item.archived {
            return false;
        }

        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            let tagged = if tag == UNTAGGED {
                item.tags.is_empty()
            } else {
                item.tags.contains(tag)
            };
            if !tagged {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = [
                item.title(),
                item.url(),
                item.given_title.as_str(),
                item.given_url.as_str(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        // Undated items already passed Pocket's own `since` check
        if let (Some(since), Some(at)) = (self.since, item.last_activity()) {
            if at < since {
                return false;
            }
        }

        true
    }

    /// Drops non-matching items, sorts by the provider's sort key
    /// (ascending, i.e. newest first for `sort=newest`) and applies `count`.
    ///
    /// Ties fall back to the item id, so the order never depends on how the
    /// response enumerated the items.
    pub fn apply(&self, items: impl IntoIterator<Item = SavedItem>) -> Vec<SavedItem> {
        let mut kept: Vec<SavedItem> = items.into_iter().filter(|i| self.matches(i)).collect();
        kept.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.id.cmp(&b.id)));

        if let Some(count) = self.count.filter(|c| *c > 0) {
            kept.truncate(count);
        }

        kept
    }
}
