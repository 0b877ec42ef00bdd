// ABOUTME: Serde data models for Pocket responses and the persisted credential
// ABOUTME: Tolerant parsing of Pocket's stringly-typed fields and empty lists

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Durable Pocket authorization, persisted verbatim as one JSON object.
///
/// Fields the provider returns besides the access token (Pocket sends
/// `username`) are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub consumer_key: String,
    pub access_token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credential {
    pub fn username(&self) -> Option<&str> {
        self.extra.get("username").and_then(|v| v.as_str())
    }
}


/// Pocket encodes most scalars as strings ("1", "1700000000"), sometimes as
/// numbers. Accept both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Str(String),
}

impl Loose {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Loose::Int(n) => Some(*n),
            Loose::Str(s) => s.trim().parse().ok(),
        }
    }
}

fn loose_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64()))
}

/// An item record as returned by `/v3/get` with `detailType=complete`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    #[serde(deserialize_with = "item_id")]
    pub item_id: String,
    #[serde(default)]
    pub given_url: Option<String>,
    #[serde(default)]
    pub resolved_url: Option<String>,
    #[serde(default)]
    pub given_title: Option<String>,
    #[serde(default)]
    pub resolved_title: Option<String>,
    #[serde(default, deserialize_with = "loose_i64")]
    pub favorite: Option<i64>,
    #[serde(default, deserialize_with = "loose_i64")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "loose_i64")]
    pub sort_id: Option<i64>,
    #[serde(default, deserialize_with = "loose_i64")]
    pub time_added: Option<i64>,
    #[serde(default, deserialize_with = "loose_i64")]
    pub time_updated: Option<i64>,
    #[serde(default)]
    pub tags: Option<HashMap<String, Value>>,
}

fn item_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Loose::deserialize(deserializer)? {
        Loose::Int(n) => Ok(n.to_string()),
        Loose::Str(s) => Ok(s),
    }
}

/// Body of a `/v3/get` response. `list` is an object keyed by item id, but
/// Pocket sends `[]` when nothing matches.
#[derive(Debug, Deserialize)]
pub struct RetrieveResponse {
    #[serde(default, deserialize_with = "item_list")]
    pub list: HashMap<String, RawItem>,
}

fn item_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, RawItem>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum List {
        Map(HashMap<String, RawItem>),
        Empty(Vec<Value>),
    }

    match Option::<List>::deserialize(deserializer)? {
        Some(List::Map(map)) => Ok(map),
        Some(List::Empty(_)) | None => Ok(HashMap::new()),
    }
}

/// A saved Pocket item, ready for filtering and export.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedItem {
    pub id: String,
    pub sort_key: i64,
    pub given_url: String,
    pub resolved_url: String,
    pub given_title: String,
    pub resolved_title: String,
    pub tags: BTreeSet<String>,
    pub favorited: bool,
    pub archived: bool,
    pub saved_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn prefer<'a>(resolved: &'a str, given: &'a str) -> &'a str {
    if resolved.is_empty() {
        given
    } else {
        resolved
    }
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.filter(|s| *s > 0)
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
}

impl SavedItem {
    pub fn url(&self) -> &str {
        prefer(&self.resolved_url, &self.given_url)
    }

    pub fn title(&self) -> &str {
        prefer(&self.resolved_title, &self.given_title)
    }

    /// Most recent activity on the item, as Pocket's `since` parameter sees it.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.saved_at)
    }
}

impl From<RawItem> for SavedItem {
    fn from(raw: RawItem) -> Self {
        let tags = raw
            .tags
            .map(|tags| tags.into_keys().collect())
            .unwrap_or_default();

        SavedItem {
            sort_key: raw.sort_id.unwrap_or(i64::MAX),
            given_url: raw.given_url.unwrap_or_default(),
            resolved_url: raw.resolved_url.unwrap_or_default(),
            given_title: raw.given_title.unwrap_or_default(),
            resolved_title: raw.resolved_title.unwrap_or_default(),
            tags,
            favorited: raw.favorite == Some(1),
            archived: raw.status == Some(1),
            saved_at: timestamp(raw.time_added),
            updated_at: timestamp(raw.time_updated),
            id: raw.item_id,
        }
    }
}

/// One exported item: what the Notion web clipper receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clipping {
    pub url: String,
    pub title: String,
}

#[cfg(test)]
mod item_tests {
    use super::*;

    #[test]
    fn test_retrieve_response_full_item() {
        let json = r#"{
            "status": 1,
            "list": {
                "229279689": {
                    "item_id": "229279689",
                    "resolved_id": "229279689",
                    "given_url": "http://www.grantland.com/blog/the-triangle/post/_/id/38347/ryder-cup-preview",
                    "given_title": "The Massive Ryder Cup Preview",
                    "favorite": "1",
                    "status": "0",
                    "resolved_title": "The Massive Ryder Cup Preview - The Triangle Blog - Grantland",
                    "resolved_url": "http://www.grantland.com/blog/the-triangle/post/_/id/38347/ryder-cup-preview",
                    "sort_id": 3,
                    "time_added": "1346976937",
                    "time_updated": "1346976999",
                    "tags": {
                        "sports": {"item_id": "229279689", "tag": "sports"},
                        "golf": {"item_id": "229279689", "tag": "golf"}
                    }
                }
            }
        }"#;
        let resp: RetrieveResponse = serde_json::from_str(json).unwrap();
        let item: SavedItem = resp.list.into_values().next().unwrap().into();

        assert_eq!(item.id, "229279689");
        assert_eq!(item.sort_key, 3);
        assert!(item.favorited);
        assert!(!item.archived);
        assert_eq!(
            item.title(),
            "The Massive Ryder Cup Preview - The Triangle Blog - Grantland"
        );
        assert_eq!(
            item.tags.iter().cloned().collect::<Vec<_>>(),
            vec!["golf".to_string(), "sports".to_string()]
        );
        assert_eq!(item.saved_at.unwrap().timestamp(), 1346976937);
        assert_eq!(item.last_activity().unwrap().timestamp(), 1346976999);
    }

    #[test]
    fn test_retrieve_response_empty_list_is_array() {
        let json = r#"{"status": 2, "complete": 1, "list": [], "since": 1700000000}"#;
        let resp: RetrieveResponse = serde_json::from_str(json).unwrap();
        assert!(resp.list.is_empty());
    }

    #[test]
    fn test_raw_item_minimal_with_numeric_fields() {
        let json = r#"{"item_id": 42, "given_url": "https://example.com", "favorite": 0, "status": 1}"#;
        let item: SavedItem = serde_json::from_str::<RawItem>(json).unwrap().into();
        assert_eq!(item.id, "42");
        assert!(item.archived);
        assert!(item.tags.is_empty());
        assert_eq!(item.sort_key, i64::MAX);
        assert!(item.saved_at.is_none());
    }

    #[test]
    fn test_url_and_title_fall_back_to_given() {
        let json = r#"{
            "item_id": "1",
            "given_url": "https://given.example",
            "resolved_url": "",
            "given_title": "Given",
            "resolved_title": ""
        }"#;
        let item: SavedItem = serde_json::from_str::<RawItem>(json).unwrap().into();
        assert_eq!(item.url(), "https://given.example");
        assert_eq!(item.title(), "Given");
    }
}
