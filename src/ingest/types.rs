// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped unit: a hot-list entry or an RSS entry.
///
/// Items are values. A new scrape produces new `Item`s; nothing mutates an
/// existing one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub source_id: String,   // e.g. "weibo", "hacker-news"
    pub source_name: String, // display name, e.g. "微博"
    pub title: String,       // normalized text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 1-based position in a hot list; absent for RSS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub observed_at: DateTime<Utc>,
    /// RSS only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Dedup identity: `(source_id, url)` when a URL exists, else
/// `(source_id, normalized title)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemIdentity {
    pub source_id: String,
    pub key: String,
}

impl Item {
    pub fn identity(&self) -> ItemIdentity {
        let key = match self.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => format!("url:{u}"),
            _ => format!("title:{}", super::normalize_title_key(&self.title)),
        };
        ItemIdentity {
            source_id: self.source_id.clone(),
            key,
        }
    }

    /// Hot-list item constructor.
    pub fn ranked(
        source_id: impl Into<String>,
        source_name: impl Into<String>,
        title: impl Into<String>,
        url: Option<String>,
        rank: u32,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_name: source_name.into(),
            title: title.into(),
            url,
            rank: Some(rank),
            observed_at,
            published_at: None,
        }
    }

    /// RSS entry constructor.
    pub fn feed_entry(
        source_id: impl Into<String>,
        source_name: impl Into<String>,
        title: impl Into<String>,
        url: Option<String>,
        published_at: Option<DateTime<Utc>>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_name: source_name.into(),
            title: title.into(),
            url,
            rank: None,
            observed_at,
            published_at,
        }
    }

    pub fn is_feed_entry(&self) -> bool {
        self.rank.is_none()
    }
}

impl std::fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.source_id, self.key)
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Item>>;
    fn name(&self) -> &str;
}
