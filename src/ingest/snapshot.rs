//! Provider that reads a scraper's JSON snapshot (an array of items for one
//! origin) from disk.
//!
//! Field names are lenient: `link`/`url`, `published`/`created_utc`/`published_at`,
//! `summary`/`selftext`/`body_excerpt`, `source`/`subreddit`/`sub_origin`.
//! Community `score` and `num_comments` are summed into engagement. A
//! `sentiment` label is kept when it is one the engine knows.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::types::SourceProvider;
use crate::item::{Origin, RawItem};
use crate::sentiment::Sentiment;

#[derive(Debug, Clone)]
pub struct JsonSnapshotProvider {
    name: String,
    origin: Origin,
    path: PathBuf,
}

impl JsonSnapshotProvider {
    pub fn new(name: impl Into<String>, origin: Origin, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            origin,
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Timestamps arrive as ISO strings or as unix seconds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Stamp {
    Text(String),
    Epoch(f64),
}

impl Stamp {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Stamp::Text(s) => parse_timestamp(s),
            Stamp::Epoch(secs) if secs.is_finite() => DateTime::from_timestamp(*secs as i64, 0),
            Stamp::Epoch(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    #[serde(default, alias = "source", alias = "subreddit")]
    sub_origin: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "summary", alias = "selftext", alias = "description")]
    body_excerpt: Option<String>,
    #[serde(default, alias = "link")]
    url: Option<String>,
    #[serde(default, alias = "published", alias = "created_utc")]
    published_at: Option<Stamp>,
    #[serde(default, alias = "score")]
    engagement: Option<f64>,
    #[serde(default)]
    num_comments: Option<f64>,
    #[serde(default)]
    sentiment: Option<String>,
}

impl SnapshotEntry {
    fn into_raw(self, origin: Origin, fallback_source: &str) -> RawItem {
        let engagement = match (self.engagement, self.num_comments) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
        RawItem {
            origin,
            sub_origin: self
                .sub_origin
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| fallback_source.to_string()),
            title: self.title,
            body_excerpt: self.body_excerpt,
            url: self.url,
            published_at: self.published_at.as_ref().and_then(Stamp::resolve),
            engagement,
            sentiment: self.sentiment.as_deref().and_then(Sentiment::from_label),
        }
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC. Anything else is "no timestamp".
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn parse_snapshot(content: &str, origin: Origin, fallback_source: &str) -> Result<Vec<RawItem>> {
    let entries: Vec<SnapshotEntry> = serde_json::from_str(content)?;
    Ok(entries
        .into_iter()
        .map(|e| e.into_raw(origin, fallback_source))
        .collect())
}

#[async_trait::async_trait]
impl SourceProvider for JsonSnapshotProvider {
    async fn fetch_items(&self) -> Result<Vec<RawItem>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading snapshot {}", self.path.display()))?;
        parse_snapshot(&content, self.origin, &self.name)
            .with_context(|| format!("parsing snapshot {}", self.path.display()))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> Origin {
        self.origin
    }
}
