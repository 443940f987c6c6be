//! # Aggregation Report
//! Final hand-off structure for the summarizer/renderer: ranked topics plus
//! the deduplicated, tagged story list in discovery order.
//!
//! Pure assembly. The builder copies what it keeps, so the caller's ranking
//! and groups are left untouched, and applies optional top-N truncation.
//! Summary, overview, leading topics and sentiment shifts are computed from
//! the full input before truncation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Window;
use crate::item::Origin;
use crate::scoring::TrendEntry;
use crate::sentiment::{sentiment_shifts, Sentiment, SentimentShift};
use crate::topics::TaggedGroup;

/// Labels listed in `AggregationReport::leading_topics`.
pub const LEADING_TOPICS: usize = 5;

/// Caller-supplied truncation. `None` keeps everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLimits {
    pub max_topics: Option<usize>,
    pub max_items: Option<usize>,
}

/// Batch statistics, computed before truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    /// Items that survived validation (all group members).
    pub total_items: usize,
    pub items_by_origin: BTreeMap<Origin, usize>,
    pub dedup_groups: usize,
    pub tagged_groups: usize,
    pub trending_topics: usize,
    /// Labels of topics seen on more than one origin, in rank order.
    pub cross_platform_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
    pub summary: DataSummary,
    /// One-paragraph plain-text digest of the batch.
    pub overview: String,
    /// Labels of the highest-ranked topics.
    pub leading_topics: Vec<String>,
    pub trends: Vec<TrendEntry>,
    /// Per-topic community mood over time; topics with one day of data are absent.
    pub sentiment_shifts: BTreeMap<String, SentimentShift>,
    pub groups: Vec<TaggedGroup>,
}

impl AggregationReport {
    pub fn top_topics(&self, n: usize) -> Vec<&str> {
        self.trends.iter().take(n).map(|t| t.topic.as_str()).collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone)]
pub struct ReportBuilder {
    generated_at: DateTime<Utc>,
    window: Option<Window>,
    limits: ReportLimits,
}

impl ReportBuilder {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            window: None,
            limits: ReportLimits::default(),
        }
    }

    pub fn window(mut self, window: Option<Window>) -> Self {
        self.window = window;
        self
    }

    pub fn limits(mut self, limits: ReportLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(&self, trends: &[TrendEntry], groups: &[TaggedGroup]) -> AggregationReport {
        let mut items_by_origin: BTreeMap<Origin, usize> =
            Origin::ALL.iter().map(|o| (*o, 0)).collect();
        for g in groups {
            for m in &g.group.members {
                *items_by_origin.entry(m.origin).or_default() += 1;
            }
        }

        let summary = DataSummary {
            total_items: items_by_origin.values().sum(),
            items_by_origin,
            dedup_groups: groups.len(),
            tagged_groups: groups.iter().filter(|g| !g.tags.is_empty()).count(),
            trending_topics: trends.len(),
            cross_platform_topics: trends
                .iter()
                .filter(|t| t.is_cross_platform())
                .map(|t| t.topic.clone())
                .collect(),
        };

        let topic_cap = self.limits.max_topics.unwrap_or(trends.len());
        let item_cap = self.limits.max_items.unwrap_or(groups.len());

        AggregationReport {
            generated_at: self.generated_at,
            window: self.window,
            overview: compose_overview(&summary, trends),
            leading_topics: trends
                .iter()
                .take(LEADING_TOPICS)
                .map(|t| t.topic.clone())
                .collect(),
            summary,
            trends: trends.iter().take(topic_cap).cloned().collect(),
            sentiment_shifts: sentiment_shifts(groups),
            groups: groups.iter().take(item_cap).cloned().collect(),
        }
    }
}

/// "a", "a and b", "a, b, and c".
fn format_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [a, b] => format!("{a} and {b}"),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    }
}

fn mood_phrase(s: Sentiment) -> &'static str {
    match s {
        Sentiment::VeryPositive => "very positive",
        Sentiment::Positive => "positive",
        Sentiment::Neutral => "mixed",
        Sentiment::Negative => "cautious",
    }
}

/// Most common per-topic community label, ties to the higher-ranked topic.
fn prevailing_mood(trends: &[TrendEntry]) -> Option<Sentiment> {
    let mut counts: Vec<(Sentiment, usize)> = Vec::new();
    for s in trends.iter().filter_map(|t| t.community_sentiment) {
        match counts.iter_mut().find(|(k, _)| *k == s) {
            Some((_, n)) => *n += 1,
            None => counts.push((s, 1)),
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(Sentiment, usize)>, (s, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((s, n)),
        })
        .map(|(s, _)| s)
}

fn compose_overview(summary: &DataSummary, trends: &[TrendEntry]) -> String {
    if summary.total_items == 0 {
        return "No items were captured this period.".to_string();
    }
    let count = |o: Origin| summary.items_by_origin.get(&o).copied().unwrap_or(0);
    let intro = format!(
        "We reviewed {} stories ({} from feeds, {} community posts)",
        summary.total_items,
        count(Origin::Rss),
        count(Origin::Community)
    );
    if trends.is_empty() {
        return format!("{intro}, but no topic crossed the trending threshold.");
    }

    let top: Vec<&str> = trends.iter().take(3).map(|t| t.topic.as_str()).collect();
    let mentions: usize = trends.iter().map(|t| t.mention_count).sum();
    let mut out = format!(
        "{intro}, with momentum centered on {}. Trending topics drew {mentions} mentions, \
         and {} of them spanned both feeds and community discussion.",
        format_list(&top),
        summary.cross_platform_topics.len()
    );
    if let Some(mood) = prevailing_mood(trends) {
        out.push_str(&format!(" Community discussion skewed {}.", mood_phrase(mood)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupGroup;
    use crate::item::{RawItem, SourceItem};
    use crate::topics::TopicTag;
    use chrono::TimeZone;

    fn group(origin: Origin, title: &str, tagged: bool) -> TaggedGroup {
        let item = SourceItem::from_raw(RawItem::new(origin, "s", title)).unwrap();
        TaggedGroup {
            group: DedupGroup {
                representative: item.clone(),
                members: vec![item],
            },
            tags: if tagged {
                vec![TopicTag {
                    label: "t".into(),
                    weight: 1.0,
                }]
            } else {
                Vec::new()
            },
        }
    }

    fn entry(topic: &str, spread: usize) -> TrendEntry {
        TrendEntry {
            topic: topic.into(),
            score: 1.0,
            raw_score: 1.0,
            spread_boost: 1.0,
            mention_count: 1,
            platform_spread: spread,
            evidence: Vec::new(),
            community_sentiment: None,
            sentiment_breakdown: Default::default(),
        }
    }

    #[test]
    fn summary_counts_full_input_and_limits_truncate() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let groups = vec![
            group(Origin::Rss, "a", true),
            group(Origin::Community, "b", false),
            group(Origin::Rss, "c", false),
        ];
        let trends = vec![entry("x", 2), entry("y", 1), entry("z", 2)];
        let report = ReportBuilder::new(now)
            .limits(ReportLimits {
                max_topics: Some(1),
                max_items: Some(2),
            })
            .build(&trends, &groups);

        assert_eq!(report.summary.total_items, 3);
        assert_eq!(report.summary.items_by_origin[&Origin::Rss], 2);
        assert_eq!(report.summary.items_by_origin[&Origin::Community], 1);
        assert_eq!(report.summary.tagged_groups, 1);
        assert_eq!(report.summary.trending_topics, 3);
        assert_eq!(report.summary.cross_platform_topics, vec!["x", "z"]);
        assert_eq!(report.top_topics(5), vec!["x"]);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[1].group.representative.title, "b");

        // Inputs untouched.
        assert_eq!(trends.len(), 3);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn serialized_field_names_follow_the_data_model() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let report = ReportBuilder::new(now)
            .build(&[entry("x", 1)], &[group(Origin::Community, "a", true)]);
        let v: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        let t = &v["trends"][0];
        for k in ["topic", "score", "mention_count", "platform_spread", "evidence"] {
            assert!(t.get(k).is_some(), "missing trend field {k}");
        }
        let g = &v["groups"][0];
        for k in ["representative", "members", "tags"] {
            assert!(g.get(k).is_some(), "missing group field {k}");
        }
        assert_eq!(g["representative"]["origin"], "COMMUNITY");
        assert_eq!(v["summary"]["items_by_origin"]["COMMUNITY"], 1);
    }

    #[test]
    fn overview_reads_counts_themes_and_mood() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let empty = ReportBuilder::new(now).build(&[], &[]);
        assert_eq!(empty.overview, "No items were captured this period.");

        let groups = vec![group(Origin::Rss, "a", false), group(Origin::Community, "b", false)];
        let quiet = ReportBuilder::new(now).build(&[], &groups);
        assert!(quiet.overview.ends_with("no topic crossed the trending threshold."));

        let mut x = entry("x", 2);
        x.community_sentiment = Some(Sentiment::Negative);
        let mut y = entry("y", 1);
        y.community_sentiment = Some(Sentiment::Positive);
        let mut z = entry("z", 1);
        z.community_sentiment = Some(Sentiment::Positive);
        let report = ReportBuilder::new(now)
            .limits(ReportLimits {
                max_topics: Some(1),
                max_items: None,
            })
            .build(&[x, y, z], &groups);
        assert_eq!(
            report.overview,
            "We reviewed 2 stories (1 from feeds, 1 community posts), with momentum centered \
             on x, y, and z. Trending topics drew 3 mentions, and 1 of them spanned both feeds \
             and community discussion. Community discussion skewed positive."
        );
        assert_eq!(report.leading_topics, vec!["x", "y", "z"]);
        assert_eq!(report.trends.len(), 1);
    }

    #[test]
    fn list_formatting() {
        assert_eq!(format_list(&["a"]), "a");
        assert_eq!(format_list(&["a", "b"]), "a and b");
        assert_eq!(format_list(&["a", "b", "c"]), "a, b, and c");
    }
}
