use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while loading or saving the persisted store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing or renaming the store file failed
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file is not a valid feed snapshot
    #[error("Store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Canonical Model
// ============================================================================

/// A single article, normalized from an RSS `<item>` or Atom `<entry>`.
///
/// `updated >= published` is not guaranteed: feeds in the wild report
/// whatever they like and nothing downstream relies on the ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Identity key within the owning feed
    pub id: String,
    /// Sanitized title text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Absolute URL of the article, unset when the feed gave nothing parseable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// A feed and every article accumulated for it.
///
/// Articles are keyed by id; consumers sort by timestamp, not map order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub link: String,
    pub updated: DateTime<Utc>,
    #[serde(with = "article_list")]
    pub articles: BTreeMap<String, Article>,
}

impl Feed {
    /// Articles sorted newest first by `published`, ties broken by id.
    pub fn articles_newest_first(&self) -> Vec<&Article> {
        let mut articles: Vec<&Article> = self.articles.values().collect();
        articles.sort_by(|a, b| b.published.cmp(&a.published).then_with(|| a.id.cmp(&b.id)));
        articles
    }
}

/// The full persisted state: every feed ever ingested, keyed by feed id.
///
/// Owned by the pipeline and mutated only through the merge engine, one
/// cycle at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    pub(crate) feeds: BTreeMap<String, Feed>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    pub fn get(&self, feed_id: &str) -> Option<&Feed> {
        self.feeds.get(feed_id)
    }

    /// Iterates feeds in id order.
    pub fn feeds(&self) -> impl Iterator<Item = &Feed> {
        self.feeds.values()
    }

    /// Total number of articles across all feeds.
    pub fn article_count(&self) -> usize {
        self.feeds.values().map(|f| f.articles.len()).sum()
    }
}

impl FromIterator<Feed> for Store {
    /// Builds a store from feed records; a later record with a repeated id wins.
    fn from_iter<I: IntoIterator<Item = Feed>>(iter: I) -> Self {
        Self {
            feeds: iter.into_iter().map(|f| (f.id.clone(), f)).collect(),
        }
    }
}

/// Serializes the article map as a plain array of Article records.
mod article_list {
    use super::Article;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(articles: &BTreeMap<String, Article>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let list: Vec<&Article> = articles.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Article>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<Article>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|a| (a.id.clone(), a)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(id: &str, day: u32) -> Article {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        Article {
            id: id.to_string(),
            title: None,
            link: None,
            published: ts,
            updated: ts,
        }
    }

    #[test]
    fn test_articles_newest_first() {
        let mut feed = Feed {
            id: "f".into(),
            title: None,
            description: None,
            link: "https://example.com/".into(),
            updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            articles: BTreeMap::new(),
        };
        for a in [article("old", 1), article("new", 9), article("mid", 5)] {
            feed.articles.insert(a.id.clone(), a);
        }

        let ids: Vec<&str> = feed.articles_newest_first().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_articles_serialize_as_array() {
        let mut feed = Feed {
            id: "f".into(),
            title: Some("Title".into()),
            description: None,
            link: "https://example.com/".into(),
            updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            articles: BTreeMap::new(),
        };
        feed.articles.insert("a".into(), article("a", 2));

        let value = serde_json::to_value(&feed).unwrap();
        assert!(value["articles"].is_array());
        assert_eq!(value["articles"][0]["id"], "a");
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_store_from_iter_keys_by_id() {
        let feed = Feed {
            id: "feed-1".into(),
            title: None,
            description: None,
            link: "https://example.com/".into(),
            updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            articles: BTreeMap::new(),
        };
        let store: Store = vec![feed].into_iter().collect();
        assert_eq!(store.len(), 1);
        assert!(store.get("feed-1").is_some());
        assert_eq!(store.article_count(), 0);
    }
}
