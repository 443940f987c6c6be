//! # Source Items
//! Canonical in-memory representation of a single fetched article or post,
//! independent of where it came from.
//!
//! - `RawItem` is what an ingestion adapter hands over; nothing is validated yet.
//! - `SourceItem` is the cleaned, identified form every later stage works on.
//! - `normalize_title` / `normalize_url` produce the fingerprints the
//!   deduplicator compares.
//!
//! Everything here is pure: no I/O, no clocks.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::ItemError;
use crate::sentiment::{classify, Sentiment};

/// Longest body excerpt kept per item (chars).
pub const BODY_EXCERPT_MAX_CHARS: usize = 300;

/// Kind of source an item was pulled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Origin {
    /// Editorial/research RSS or Atom feeds.
    Rss,
    /// Community discussion boards (forums, link aggregators).
    Community,
}

impl Origin {
    pub const ALL: [Origin; 2] = [Origin::Rss, Origin::Community];

    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Rss => "rss",
            Origin::Community => "community",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated item as produced by an ingestion adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub origin: Origin,
    /// Feed or board name, e.g. "Hacker News", "MIT Technology Review".
    #[serde(default)]
    pub sub_origin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body_excerpt: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Upvotes/comments/points; scale depends on the origin.
    #[serde(default)]
    pub engagement: Option<f64>,
    /// Label assigned upstream, if any.
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
}

impl RawItem {
    /// Minimal constructor; optional fields can be filled in with the builder helpers.
    pub fn new(origin: Origin, sub_origin: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            origin,
            sub_origin: sub_origin.into(),
            title: Some(title.into()),
            body_excerpt: None,
            url: None,
            published_at: None,
            engagement: None,
            sentiment: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body_excerpt = Some(body.into());
        self
    }

    pub fn published(mut self, ts: DateTime<Utc>) -> Self {
        self.published_at = Some(ts);
        self
    }

    pub fn with_engagement(mut self, engagement: f64) -> Self {
        self.engagement = Some(engagement);
        self
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }
}

/// A cleaned, identified item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub id: String,
    pub origin: Origin,
    pub sub_origin: String,
    pub title: String,
    pub body_excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<f64>,
    /// Upstream label, else derived from text and engagement.
    pub sentiment: Sentiment,
}

impl SourceItem {
    /// Validate and clean a raw item.
    ///
    /// Only a missing title is fatal for the item. Optional fields that are
    /// unusable (unparseable URL, non-finite engagement) fall back to "absent".
    pub fn from_raw(raw: RawItem) -> Result<Self, ItemError> {
        let title = raw.title.as_deref().ok_or(ItemError::MissingTitle)?;
        let title = clean_text(title, None);
        let body_excerpt = raw
            .body_excerpt
            .as_deref()
            .map(|b| clean_text(b, Some(BODY_EXCERPT_MAX_CHARS)))
            .unwrap_or_default();

        let url = raw
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let engagement = raw.engagement.filter(|e| e.is_finite());
        let sentiment = raw
            .sentiment
            .unwrap_or_else(|| classify(&format!("{title} {body_excerpt}"), engagement));

        let id = item_id(
            raw.origin,
            url.as_deref().and_then(normalize_url).as_deref(),
            &title,
            raw.published_at,
        );

        Ok(Self {
            id,
            origin: raw.origin,
            sub_origin: raw.sub_origin.trim().to_string(),
            title,
            body_excerpt,
            url,
            published_at: raw.published_at,
            engagement,
            sentiment,
        })
    }

    /// Title fingerprint used for near-duplicate matching.
    pub fn fingerprint(&self) -> String {
        normalize_title(&self.title)
    }

    /// Normalized URL used for exact-link matching.
    pub fn normalized_url(&self) -> Option<String> {
        self.url.as_deref().and_then(normalize_url)
    }

    /// Title and body excerpt joined, the text topic extraction runs over.
    pub fn text(&self) -> String {
        if self.body_excerpt.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.body_excerpt)
        }
    }

    /// Engagement with the "absent means zero" default applied.
    pub fn engagement_or_zero(&self) -> f64 {
        self.engagement.unwrap_or(0.0)
    }
}

/// Stable id: sha256 over origin + canonical URL, or origin + title + timestamp
/// when there is no usable URL. First 8 bytes, hex encoded.
pub fn item_id(
    origin: Origin,
    normalized_url: Option<&str>,
    title: &str,
    published_at: Option<DateTime<Utc>>,
) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(origin.as_str().as_bytes());
    hasher.update(b"|");
    match normalized_url {
        Some(u) => {
            hasher.update(b"url|");
            hasher.update(u.as_bytes());
        }
        None => {
            hasher.update(b"title|");
            hasher.update(title.trim().to_lowercase().as_bytes());
            hasher.update(b"|");
            if let Some(ts) = published_at {
                hasher.update(ts.timestamp().to_string().as_bytes());
            }
        }
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Clean feed text: decode HTML entities, strip tags, fold typographic quotes,
/// collapse whitespace. `max_chars` caps the result length.
pub fn clean_text(s: &str, max_chars: Option<usize>) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if let Some(max) = max_chars {
        if out.chars().count() > max {
            out = out.chars().take(max).collect::<String>().trim_end().to_string();
        }
    }
    out
}

/// Lowercased alphanumeric runs; every other char is a separator.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut cur = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            cur.extend(ch.to_lowercase());
        } else if !cur.is_empty() {
            tokens.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        tokens.push(cur);
    }
    tokens
}

/// Title fingerprint: lowercase, punctuation and whitespace runs folded to a
/// single space, stopwords removed.
pub fn normalize_title(text: &str) -> String {
    let stop = stopwords();
    tokenize(text)
        .into_iter()
        .filter(|t| !stop.contains(t.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical link form: `scheme://host/path`, query and fragment dropped,
/// trailing slash trimmed. `None` for anything that does not parse or has no host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let path = parsed.path().trim_end_matches('/');
    Some(format!("{}://{}{}", parsed.scheme(), host, path))
}

/// Function words plus headline filler that says nothing about the story.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "against", "all", "also", "an", "and", "announce", "announced",
    "announces", "are", "as", "at", "based", "be", "been", "being", "breaking", "but", "by",
    "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "he", "her",
    "his", "how", "i", "if", "in", "into", "introduce", "introduces", "is", "it", "its",
    "just", "latest", "launch", "launches", "may", "more", "new", "no", "not", "now", "of",
    "on", "or", "our", "out", "over", "report", "reports", "researchers", "reveal", "reveals",
    "s", "say", "says", "she", "so", "t", "than", "that", "the", "their", "them", "they",
    "this", "to", "unveil", "unveiled", "unveils", "up", "via", "was", "we", "were", "what",
    "when", "which", "who", "why", "will", "with", "would", "you", "your",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceCell<HashSet<&'static str>> = OnceCell::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn title_fingerprint_drops_punctuation_and_stopwords() {
        assert_eq!(
            normalize_title("  The NEW Diffusion-Model, explained!!  "),
            "diffusion model explained"
        );
        assert_eq!(normalize_title("   "), "");
        assert_eq!(normalize_title("The a of"), "");
    }

    #[test]
    fn url_normalization_strips_query_and_fragment() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/news/story/?utm_source=x#top").as_deref(),
            Some("https://example.com/news/story")
        );
        assert_eq!(normalize_url("not a url"), None);
        assert_eq!(normalize_url("mailto:someone@example.com"), None);
    }

    #[test]
    fn clean_text_decodes_and_caps() {
        let s = "<p>Hello&nbsp;<b>world</b> &ldquo;ok&rdquo;</p>";
        assert_eq!(clean_text(s, None), r#"Hello world "ok""#);
        let long = "x".repeat(1_000);
        assert_eq!(clean_text(&long, Some(300)).chars().count(), 300);
    }

    #[test]
    fn id_prefers_url_and_is_stable() {
        let a = SourceItem::from_raw(
            RawItem::new(Origin::Rss, "Feed A", "Title one").with_url("https://x.org/a?ref=1"),
        )
        .unwrap();
        let b = SourceItem::from_raw(
            RawItem::new(Origin::Rss, "Feed B", "Different title").with_url("https://x.org/a"),
        )
        .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);

        let c = SourceItem::from_raw(RawItem::new(Origin::Community, "Board", "Title one")).unwrap();
        let d = SourceItem::from_raw(
            RawItem::new(Origin::Community, "Board", "Title one")
                .published(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        )
        .unwrap();
        assert_ne!(c.id, d.id);
    }

    #[test]
    fn missing_title_is_rejected_but_blank_title_is_kept() {
        let mut raw = RawItem::new(Origin::Rss, "Feed", "x");
        raw.title = None;
        assert!(matches!(SourceItem::from_raw(raw), Err(ItemError::MissingTitle)));

        let blank = SourceItem::from_raw(RawItem::new(Origin::Rss, "Feed", "  ")).unwrap();
        assert_eq!(blank.title, "");
    }

    #[test]
    fn non_finite_engagement_is_treated_as_absent() {
        let item = SourceItem::from_raw(
            RawItem::new(Origin::Community, "Board", "t").with_engagement(f64::NAN),
        )
        .unwrap();
        assert_eq!(item.engagement, None);
        assert_eq!(item.engagement_or_zero(), 0.0);
    }
}
