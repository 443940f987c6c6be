//! # Trend Scorer
//! Aggregates topic evidence across tagged dedup groups and ranks topics.
//!
//! Per (topic, group):
//! ```text
//! age_days          = max(0, now - representative.published_at) in days (missing → window length)
//! recency_factor    = decay_base ^ age_days
//! engagement_factor = 1 + ln(1 + max(engagement, 0)) * engagement_coeff
//! contribution      = tag.weight * recency_factor * engagement_factor * source_weight
//! ```
//! Topic score = sum of contributions × `1 + spread_coeff * (platform_spread - 1)`,
//! where `platform_spread` counts distinct origins over all members of the
//! contributing groups. `source_weight` is 1.0 unless overrides are configured.
//!
//! Every number that goes into a score is carried on the entry, so a score can
//! be re-derived from the entry alone. Entries also carry the community mood
//! across the same groups; it never affects the score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::config::ScoringConfig;
use crate::item::Origin;
use crate::sentiment::{Sentiment, SentimentBreakdown};
use crate::source_weights::SourceWeights;
use crate::topics::{TaggedGroup, TopicTag};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// One group's share of a topic score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Representative id of the cited group.
    pub group_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub origin: Origin,
    pub sub_origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub members: usize,
    pub tag_weight: f64,
    pub age_days: f64,
    pub recency_factor: f64,
    pub engagement_factor: f64,
    pub source_weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendEntry {
    pub topic: String,
    /// Final score: `raw_score * spread_boost`.
    pub score: f64,
    /// Sum of all group contributions before the cross-platform boost.
    pub raw_score: f64,
    pub spread_boost: f64,
    /// Distinct groups carrying the topic.
    pub mention_count: usize,
    /// Distinct origins across those groups' members.
    pub platform_spread: usize,
    /// Up to K highest-contributing groups, strongest first.
    pub evidence: Vec<Evidence>,
    /// Most common label among community members; `None` without any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_sentiment: Option<Sentiment>,
    pub sentiment_breakdown: SentimentBreakdown,
}

impl TrendEntry {
    pub fn is_cross_platform(&self) -> bool {
        self.platform_spread > 1
    }
}

pub fn recency_factor(decay_base: f64, age_days: f64) -> f64 {
    decay_base.powf(age_days.max(0.0))
}

pub fn engagement_factor(engagement: Option<f64>, coeff: f64) -> f64 {
    1.0 + engagement.unwrap_or(0.0).max(0.0).ln_1p() * coeff
}

/// Fractional days between `published_at` and `now`, floored at zero.
/// Missing timestamps count as `window_days` old.
pub fn age_days(now: DateTime<Utc>, published_at: Option<DateTime<Utc>>, window_days: f64) -> f64 {
    match published_at {
        Some(ts) => ((now - ts).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0),
        None => window_days.max(0.0),
    }
}

#[derive(Debug, Clone)]
pub struct TrendScorer {
    config: ScoringConfig,
    source_weights: SourceWeights,
}

#[derive(Default)]
struct TopicAcc {
    evidence: Vec<Evidence>,
    origins: BTreeSet<Origin>,
    sentiment: SentimentBreakdown,
}

impl TrendScorer {
    /// `source_weights` should already be normalized (see `SourceWeights::normalized`).
    pub fn new(config: ScoringConfig, source_weights: SourceWeights) -> Self {
        Self {
            config,
            source_weights,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Contribution of one tagged group to one topic.
    pub fn contribution(
        &self,
        tag: &TopicTag,
        tagged: &TaggedGroup,
        now: DateTime<Utc>,
        window_days: f64,
    ) -> Evidence {
        let rep = &tagged.group.representative;
        let age = age_days(now, rep.published_at, window_days);
        let recency = recency_factor(self.config.decay_base, age);
        let engagement = engagement_factor(rep.engagement, self.config.engagement_coeff);
        let source_weight = self.source_weights.weight_for(&rep.sub_origin);
        Evidence {
            group_id: rep.id.clone(),
            title: rep.title.clone(),
            url: rep.url.clone(),
            origin: rep.origin,
            sub_origin: rep.sub_origin.clone(),
            published_at: rep.published_at,
            members: tagged.group.len(),
            tag_weight: tag.weight,
            age_days: age,
            recency_factor: recency,
            engagement_factor: engagement,
            source_weight,
            contribution: tag.weight * recency * engagement * source_weight,
        }
    }

    /// Ranked trend entries for all tagged groups.
    ///
    /// Order: score desc, mention_count desc, platform_spread desc, topic asc.
    pub fn rank(
        &self,
        groups: &[TaggedGroup],
        now: DateTime<Utc>,
        window_days: f64,
    ) -> Vec<TrendEntry> {
        let mut by_topic: BTreeMap<&str, TopicAcc> = BTreeMap::new();
        for tagged in groups {
            for tag in &tagged.tags {
                let acc = by_topic.entry(tag.label.as_str()).or_default();
                acc.evidence
                    .push(self.contribution(tag, tagged, now, window_days));
                acc.origins.extend(tagged.group.origins());
                acc.sentiment.record_items(&tagged.group.members);
            }
        }

        let mut entries: Vec<TrendEntry> = by_topic
            .into_iter()
            .filter_map(|(topic, acc)| self.finish(topic, acc))
            .collect();
        entries.sort_by(rank_order);

        debug!(
            target: "trend",
            groups = groups.len(),
            topics = entries.len(),
            "trend scoring finished"
        );
        entries
    }

    fn finish(&self, topic: &str, mut acc: TopicAcc) -> Option<TrendEntry> {
        if acc.evidence.is_empty() {
            return None;
        }
        // Sum in id order so the total does not depend on input order.
        acc.evidence.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        let raw_score: f64 = acc.evidence.iter().map(|e| e.contribution).sum();

        let platform_spread = acc.origins.len();
        let spread_boost =
            1.0 + self.config.spread_coeff * (platform_spread.saturating_sub(1) as f64);
        let score = raw_score * spread_boost;
        if !score.is_finite() || score <= 0.0 || score < self.config.min_score {
            return None;
        }

        let mention_count = acc.evidence.len();
        acc.evidence.sort_by(evidence_order);
        acc.evidence.truncate(self.config.evidence_k);

        Some(TrendEntry {
            topic: topic.to_string(),
            score,
            raw_score,
            spread_boost,
            mention_count,
            platform_spread,
            evidence: acc.evidence,
            community_sentiment: acc.sentiment.dominant(),
            sentiment_breakdown: acc.sentiment,
        })
    }
}

fn rank_order(a: &TrendEntry, b: &TrendEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.mention_count.cmp(&a.mention_count))
        .then_with(|| b.platform_spread.cmp(&a.platform_spread))
        .then_with(|| a.topic.cmp(&b.topic))
}

/// Strongest first; ties go to the earlier story (undated last), then smaller id.
fn evidence_order(a: &Evidence, b: &Evidence) -> Ordering {
    let by_time = match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    b.contribution
        .total_cmp(&a.contribution)
        .then(by_time)
        .then_with(|| a.group_id.cmp(&b.group_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupGroup;
    use crate::item::{RawItem, SourceItem};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn tagged(raw: RawItem, tags: &[(&str, f64)]) -> TaggedGroup {
        let item = SourceItem::from_raw(raw).unwrap();
        TaggedGroup {
            group: DedupGroup {
                representative: item.clone(),
                members: vec![item],
            },
            tags: tags
                .iter()
                .map(|(l, w)| TopicTag {
                    label: l.to_string(),
                    weight: *w,
                })
                .collect(),
        }
    }

    fn scorer() -> TrendScorer {
        TrendScorer::new(ScoringConfig::default(), SourceWeights::default())
    }

    #[test]
    fn factor_helpers() {
        assert!((recency_factor(0.85, 0.0) - 1.0).abs() < 1e-12);
        assert!((recency_factor(0.85, 2.0) - 0.7225).abs() < 1e-12);
        assert!((engagement_factor(None, 0.1) - 1.0).abs() < 1e-12);
        assert!((engagement_factor(Some(-40.0), 0.1) - 1.0).abs() < 1e-12);
        let e = engagement_factor(Some(120.0), 0.1);
        assert!((e - (1.0 + 121f64.ln() * 0.1)).abs() < 1e-12);
        assert_eq!(age_days(now(), Some(now() + Duration::days(2)), 7.0), 0.0);
        assert_eq!(age_days(now(), None, 7.0), 7.0);
    }

    #[test]
    fn single_topic_score_matches_formula() {
        let g = tagged(
            RawItem::new(Origin::Rss, "feed", "robots")
                .published(now() - Duration::days(1))
                .with_engagement(10.0),
            &[("robotics", 0.5)],
        );
        let out = scorer().rank(&[g], now(), 7.0);
        assert_eq!(out.len(), 1);
        let expected = 0.5 * 0.85 * (1.0 + 11f64.ln() * 0.1);
        assert!((out[0].score - expected).abs() < 1e-12);
        assert_eq!(out[0].mention_count, 1);
        assert_eq!(out[0].platform_spread, 1);
        assert!((out[0].spread_boost - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_timestamp_gets_full_window_decay() {
        let g = tagged(RawItem::new(Origin::Rss, "feed", "undated"), &[("t", 1.0)]);
        let out = scorer().rank(&[g], now(), 7.0);
        assert!((out[0].score - 0.85f64.powi(7)).abs() < 1e-12);
    }

    #[test]
    fn spread_boost_counts_distinct_origins() {
        let a = tagged(
            RawItem::new(Origin::Rss, "feed", "a").published(now()),
            &[("t", 1.0)],
        );
        let b = tagged(
            RawItem::new(Origin::Community, "board", "b").published(now()),
            &[("t", 1.0)],
        );
        let c = tagged(
            RawItem::new(Origin::Community, "board2", "c").published(now()),
            &[("t", 1.0)],
        );
        let out = scorer().rank(&[a, b, c], now(), 7.0);
        assert_eq!(out[0].platform_spread, 2);
        assert_eq!(out[0].mention_count, 3);
        assert!((out[0].score - 3.0 * 1.15).abs() < 1e-12);
    }

    #[test]
    fn ranking_ties_fall_back_to_label() {
        let a = tagged(
            RawItem::new(Origin::Rss, "feed", "x").published(now()),
            &[("beta", 0.5), ("alpha", 0.5)],
        );
        let out = scorer().rank(&[a], now(), 7.0);
        let labels: Vec<&str> = out.iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "beta"]);
    }

    #[test]
    fn evidence_is_capped_and_strongest_first() {
        let groups: Vec<TaggedGroup> = (0..5)
            .map(|i| {
                tagged(
                    RawItem::new(Origin::Rss, "feed", format!("story {i}"))
                        .published(now() - Duration::days(i)),
                    &[("t", 1.0)],
                )
            })
            .collect();
        let out = scorer().rank(&groups, now(), 7.0);
        assert_eq!(out[0].mention_count, 5);
        assert_eq!(out[0].evidence.len(), 3);
        let titles: Vec<&str> = out[0].evidence.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["story 0", "story 1", "story 2"]);
    }

    #[test]
    fn min_score_filters_weak_topics() {
        let cfg = ScoringConfig {
            min_score: 0.9,
            ..ScoringConfig::default()
        };
        let s = TrendScorer::new(cfg, SourceWeights::default());
        let strong = tagged(
            RawItem::new(Origin::Rss, "feed", "a").published(now()),
            &[("strong", 1.0), ("weak", 0.2)],
        );
        let out = s.rank(&[strong], now(), 7.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, "strong");
    }

    #[test]
    fn untagged_groups_contribute_nothing() {
        let g = tagged(RawItem::new(Origin::Rss, "feed", "x").published(now()), &[]);
        assert!(scorer().rank(&[g], now(), 7.0).is_empty());
    }

    #[test]
    fn community_mood_is_counted_per_topic() {
        let rss = tagged(
            RawItem::new(Origin::Rss, "feed", "a")
                .published(now())
                .with_sentiment(Sentiment::Negative),
            &[("t", 1.0)],
        );
        let hot = tagged(
            RawItem::new(Origin::Community, "board", "b")
                .published(now())
                .with_sentiment(Sentiment::Positive),
            &[("t", 1.0)],
        );
        let cold = tagged(
            RawItem::new(Origin::Community, "board", "c")
                .published(now())
                .with_sentiment(Sentiment::Positive),
            &[("t", 1.0), ("u", 1.0)],
        );
        let out = scorer().rank(&[rss.clone(), hot, cold], now(), 7.0);
        let t = out.iter().find(|e| e.topic == "t").unwrap();
        assert_eq!(t.sentiment_breakdown.positive, 2);
        assert_eq!(t.sentiment_breakdown.negative, 0);
        assert_eq!(t.community_sentiment, Some(Sentiment::Positive));

        let only_rss = scorer().rank(&[rss], now(), 7.0);
        assert_eq!(only_rss[0].community_sentiment, None);
        assert_eq!(only_rss[0].sentiment_breakdown.total(), 0);
    }
}
