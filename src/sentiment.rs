//! # Community sentiment
//! Lexicon scoring with a short negation window, mapped to four coarse labels
//! together with the post's engagement. Adapters may supply a label; otherwise
//! one is derived from the item text when the item is built.
//!
//! Per topic, the report carries a breakdown of community labels and, when
//! dated community posts span at least two days, the direction the mood took.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::item::{tokenize, Origin, SourceItem};
use crate::topics::TaggedGroup;

/// Engagement above which a non-negative post counts as very positive.
pub const VERY_POSITIVE_ENGAGEMENT: f64 = 150.0;
/// Engagement above which a non-negative post counts as positive.
pub const POSITIVE_ENGAGEMENT: f64 = 60.0;
/// Minimum change between early and recent daily averages to call a shift.
pub const SHIFT_MARGIN: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Lenient parse of an adapter label. Unknown labels give `None`.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "very_positive" => Some(Self::VeryPositive),
            "positive" => Some(Self::Positive),
            "neutral" | "mixed" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }

    /// +1 for either positive label, -1 for negative, 0 otherwise.
    pub fn polarity(self) -> f64 {
        match self {
            Self::VeryPositive | Self::Positive => 1.0,
            Self::Neutral => 0.0,
            Self::Negative => -1.0,
        }
    }
}

static LEXICON: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
    const POSITIVE: &[&str] = &[
        "amazing", "awesome", "breakthrough", "excellent", "exciting", "great", "impressive",
        "incredible", "love", "promising",
    ];
    const NEGATIVE: &[&str] = &[
        "awful", "concerning", "dangerous", "disappointing", "hate", "overhyped", "risky",
        "scary", "terrible", "worried",
    ];
    POSITIVE
        .iter()
        .map(|w| (*w, 1))
        .chain(NEGATIVE.iter().map(|w| (*w, -1)))
        .collect()
});

fn is_negator(tok: &str) -> bool {
    matches!(tok, "not" | "no" | "never" | "cannot" | "without" | "isn" | "wasn" | "aren" | "won" | "can")
}

/// Net lexicon score of `text`. A negator in the three preceding tokens flips a word.
pub fn lexicon_score(text: &str) -> i32 {
    let tokens = tokenize(text);
    let mut score = 0;
    for (i, w) in tokens.iter().enumerate() {
        let base = LEXICON.get(w.as_str()).copied().unwrap_or(0);
        if base == 0 {
            continue;
        }
        let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
        score += if negated { -base } else { base };
    }
    score
}

/// Label for a post from its text and engagement.
pub fn classify(text: &str, engagement: Option<f64>) -> Sentiment {
    let net = lexicon_score(text);
    let engagement = engagement.unwrap_or(0.0);
    if net >= 0 && engagement > VERY_POSITIVE_ENGAGEMENT {
        Sentiment::VeryPositive
    } else if net >= 0 && engagement > POSITIVE_ENGAGEMENT {
        Sentiment::Positive
    } else if net < 0 || engagement < 0.0 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Community label counts for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub very_positive: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentBreakdown {
    pub fn record(&mut self, s: Sentiment) {
        match s {
            Sentiment::VeryPositive => self.very_positive += 1,
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
    }

    /// Count only community members; editorial items carry no crowd mood.
    pub fn record_items<'a>(&mut self, items: impl IntoIterator<Item = &'a SourceItem>) {
        for it in items {
            if it.origin == Origin::Community {
                self.record(it.sentiment);
            }
        }
    }

    pub fn total(&self) -> usize {
        self.very_positive + self.positive + self.neutral + self.negative
    }

    /// Most frequent label; `None` when nothing was counted. Ties go to the
    /// more positive label, with negative ahead of neutral.
    pub fn dominant(&self) -> Option<Sentiment> {
        if self.total() == 0 {
            return None;
        }
        [
            (Sentiment::VeryPositive, self.very_positive),
            (Sentiment::Positive, self.positive),
            (Sentiment::Negative, self.negative),
            (Sentiment::Neutral, self.neutral),
        ]
        .into_iter()
        .fold(None, |best: Option<(Sentiment, usize)>, (s, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((s, n)),
        })
        .map(|(s, _)| s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftDirection {
    Improving,
    Declining,
    Stable,
}

/// How community mood on a topic moved across the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentShift {
    pub direction: ShiftDirection,
    /// Mean of the last two daily averages.
    pub recent: f64,
    /// `recent` minus the mean of the first two daily averages.
    pub change: f64,
    /// Mean polarity per UTC day.
    pub daily: BTreeMap<NaiveDate, f64>,
}

/// Per-topic shifts over dated community members of tagged groups. Topics
/// with fewer than two distinct days are left out.
pub fn sentiment_shifts(groups: &[TaggedGroup]) -> BTreeMap<String, SentimentShift> {
    let mut per_topic: BTreeMap<&str, BTreeMap<NaiveDate, (f64, usize)>> = BTreeMap::new();
    for g in groups {
        for tag in &g.tags {
            let days = per_topic.entry(tag.label.as_str()).or_default();
            for m in &g.group.members {
                if m.origin != Origin::Community {
                    continue;
                }
                if let Some(ts) = m.published_at {
                    let slot = days.entry(ts.date_naive()).or_insert((0.0, 0));
                    slot.0 += m.sentiment.polarity();
                    slot.1 += 1;
                }
            }
        }
    }

    per_topic
        .into_iter()
        .filter(|(_, days)| days.len() >= 2)
        .map(|(topic, days)| {
            let daily: BTreeMap<NaiveDate, f64> =
                days.into_iter().map(|(d, (sum, n))| (d, sum / n as f64)).collect();
            let avgs: Vec<f64> = daily.values().copied().collect();
            let early = (avgs[0] + avgs[1]) / 2.0;
            let recent = (avgs[avgs.len() - 2] + avgs[avgs.len() - 1]) / 2.0;
            let change = recent - early;
            let direction = if change > SHIFT_MARGIN {
                ShiftDirection::Improving
            } else if change < -SHIFT_MARGIN {
                ShiftDirection::Declining
            } else {
                ShiftDirection::Stable
            };
            (
                topic.to_string(),
                SentimentShift {
                    direction,
                    recent,
                    change,
                    daily,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupGroup;
    use crate::item::RawItem;
    use crate::topics::TopicTag;
    use chrono::{TimeZone, Utc};

    #[test]
    fn negation_flips_lexicon_words() {
        assert_eq!(lexicon_score("An amazing, exciting result"), 2);
        assert_eq!(lexicon_score("not exciting at all"), -1);
        assert_eq!(lexicon_score("this is terrible"), -1);
        assert_eq!(lexicon_score("plain update"), 0);
    }

    #[test]
    fn engagement_and_tone_pick_the_label() {
        assert_eq!(classify("great news", Some(200.0)), Sentiment::VeryPositive);
        assert_eq!(classify("plain update", Some(80.0)), Sentiment::Positive);
        assert_eq!(classify("scary stuff", Some(500.0)), Sentiment::Negative);
        assert_eq!(classify("plain update", Some(-3.0)), Sentiment::Negative);
        assert_eq!(classify("great news", None), Sentiment::Neutral);
    }

    #[test]
    fn labels_parse_leniently() {
        assert_eq!(Sentiment::from_label("Very Positive"), Some(Sentiment::VeryPositive));
        assert_eq!(Sentiment::from_label("very-positive"), Some(Sentiment::VeryPositive));
        assert_eq!(Sentiment::from_label("mixed"), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::from_label("meh"), None);
    }

    #[test]
    fn dominant_prefers_positive_on_ties() {
        let mut b = SentimentBreakdown::default();
        assert_eq!(b.dominant(), None);
        b.record(Sentiment::Neutral);
        b.record(Sentiment::Negative);
        assert_eq!(b.dominant(), Some(Sentiment::Negative));
        b.record(Sentiment::Positive);
        assert_eq!(b.dominant(), Some(Sentiment::Positive));
        b.record(Sentiment::Neutral);
        assert_eq!(b.dominant(), Some(Sentiment::Neutral));
    }

    fn post(day: u32, sentiment: Sentiment) -> SourceItem {
        let ts = Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap();
        let mut raw = RawItem::new(Origin::Community, "Board", format!("Quasar thread {day}"))
            .published(ts);
        raw.sentiment = Some(sentiment);
        SourceItem::from_raw(raw).unwrap()
    }

    fn tagged(members: Vec<SourceItem>) -> TaggedGroup {
        TaggedGroup {
            group: DedupGroup {
                representative: members[0].clone(),
                members,
            },
            tags: vec![TopicTag {
                label: "alpha".into(),
                weight: 1.0,
            }],
        }
    }

    #[test]
    fn shifts_need_two_days_and_compare_ends() {
        let one_day = vec![tagged(vec![post(1, Sentiment::Negative)])];
        assert!(sentiment_shifts(&one_day).is_empty());

        let groups = vec![
            tagged(vec![post(1, Sentiment::Negative)]),
            tagged(vec![post(2, Sentiment::Neutral)]),
            tagged(vec![post(3, Sentiment::Positive), post(3, Sentiment::VeryPositive)]),
            tagged(vec![post(4, Sentiment::Positive)]),
        ];
        let shifts = sentiment_shifts(&groups);
        let s = &shifts["alpha"];
        assert_eq!(s.daily.len(), 4);
        assert!((s.recent - 1.0).abs() < 1e-12);
        assert!((s.change - 1.5).abs() < 1e-12);
        assert_eq!(s.direction, ShiftDirection::Improving);
    }
}
