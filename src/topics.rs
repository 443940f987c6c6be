//! Keyword/topic extraction.
//!
//! Keyword groups are data: a mapping `label -> { keywords, weight }` loaded
//! from config. A topic matches an item when any of its keywords appears in
//! the item's text as a contiguous run of tokens (case-insensitive, word
//! boundaries respected). A topic is tagged at most once per item.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::dedup::DedupGroup;
use crate::error::ConfigError;
use crate::item::tokenize;

/// One configured keyword group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordGroup {
    /// Single words or multi-word phrases.
    pub keywords: Vec<String>,
    /// Contribution strength in (0, 1].
    #[serde(default = "default_topic_weight")]
    pub weight: f64,
}

fn default_topic_weight() -> f64 {
    1.0
}

impl KeywordGroup {
    pub fn new<I, S>(keywords: I, weight: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            weight,
        }
    }
}

/// Topic label to keyword group; ordered so iteration is deterministic.
pub type TopicConfig = BTreeMap<String, KeywordGroup>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTag {
    pub label: String,
    pub weight: f64,
}

/// A dedup group annotated with the topics its representative matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedGroup {
    #[serde(flatten)]
    pub group: DedupGroup,
    /// Sorted by label; empty when nothing matched.
    pub tags: Vec<TopicTag>,
}

#[derive(Debug, Clone)]
struct CompiledTopic {
    label: String,
    weight: f64,
    phrases: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct TopicExtractor {
    topics: Vec<CompiledTopic>,
}

impl TopicExtractor {
    /// Validate and pre-tokenize every keyword group.
    pub fn new(config: &TopicConfig) -> Result<Self, ConfigError> {
        let mut topics = Vec::with_capacity(config.len());
        let mut seen = BTreeSet::new();
        for (label, group) in config {
            let label = label.trim();
            if label.is_empty() {
                return Err(ConfigError::EmptyTopicLabel);
            }
            if !seen.insert(label) {
                return Err(ConfigError::DuplicateTopicLabel(label.to_string()));
            }
            if !(group.weight.is_finite() && group.weight > 0.0 && group.weight <= 1.0) {
                return Err(ConfigError::InvalidTopicWeight {
                    topic: label.to_string(),
                    weight: group.weight,
                });
            }
            let mut phrases: Vec<Vec<String>> = group
                .keywords
                .iter()
                .map(|k| tokenize(k))
                .filter(|p| !p.is_empty())
                .collect();
            phrases.sort();
            phrases.dedup();
            if phrases.is_empty() {
                return Err(ConfigError::EmptyKeywords {
                    topic: label.to_string(),
                });
            }
            topics.push(CompiledTopic {
                label: label.to_string(),
                weight: group.weight,
                phrases,
            });
        }
        topics.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(Self { topics })
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Tags for free text, sorted by label.
    pub fn extract(&self, text: &str) -> Vec<TopicTag> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }
        self.topics
            .iter()
            .filter(|t| t.phrases.iter().any(|p| contains_phrase(&tokens, p)))
            .map(|t| TopicTag {
                label: t.label.clone(),
                weight: t.weight,
            })
            .collect()
    }

    /// Tag a group from its representative's title and body excerpt.
    pub fn tag(&self, group: DedupGroup) -> TaggedGroup {
        let tags = self.extract(&group.representative.text());
        TaggedGroup { group, tags }
    }
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    phrase.len() <= tokens.len() && tokens.windows(phrase.len()).any(|w| w == phrase)
}
