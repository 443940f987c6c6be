//! # Pipeline
//! `TrendEngine` runs one batch end to end:
//!
//! raw items → validate/clean (+ window) → dedup → topic tagging → trend
//! scoring → report.
//!
//! The engine holds only validated configuration. A run is a pure function
//! of `(items, config, now)`, so engines can be shared across threads and
//! identical inputs always give identical output.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use crate::config::{ScoringConfig, TrendConfig, Window};
use crate::dedup::Deduplicator;
use crate::error::{ConfigError, Diagnostic, DiagnosticKind};
use crate::ingest::{self, types::SourceProvider};
use crate::item::{Origin, RawItem};
use crate::report::{AggregationReport, ReportBuilder, ReportLimits};
use crate::scoring::TrendScorer;
use crate::topics::{TaggedGroup, TopicExtractor};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunOptions {
    /// Drop items dated outside this window.
    pub window: Option<Window>,
    pub limits: ReportLimits,
}

/// Report plus the side-channel warnings gathered during the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub report: AggregationReport,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct TrendEngine {
    scoring: ScoringConfig,
    extractor: TopicExtractor,
    dedup: Deduplicator,
    scorer: TrendScorer,
}

impl TrendEngine {
    /// Validate the whole config up front; nothing runs on a bad config.
    pub fn new(config: &TrendConfig) -> Result<Self, ConfigError> {
        config.scoring.validate()?;
        let extractor = TopicExtractor::new(&config.topics)?;
        let source_weights = config.source_weights.normalized()?;
        Ok(Self {
            scoring: config.scoring,
            extractor,
            dedup: Deduplicator::new(config.scoring.dedup_threshold),
            scorer: TrendScorer::new(config.scoring, source_weights),
        })
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Run one batch. Only an inverted window is an error here; bad items
    /// end up in `RunOutcome::diagnostics`.
    pub fn run(
        &self,
        raw: Vec<RawItem>,
        now: DateTime<Utc>,
        opts: &RunOptions,
    ) -> Result<RunOutcome, ConfigError> {
        if let Some(w) = &opts.window {
            Window::new(w.start, w.end)?;
        }

        let prepared = ingest::prepare_items(raw, opts.window.as_ref());
        let item_count = prepared.items.len();

        let groups = self.dedup.group(prepared.items);
        counter!("trend_dedup_merged_total").increment((item_count - groups.len()) as u64);

        let tagged: Vec<TaggedGroup> = groups.into_iter().map(|g| self.extractor.tag(g)).collect();

        // An empty window says nothing about how old undated items are.
        let window_days = opts
            .window
            .map(|w| w.length_days())
            .filter(|d| *d > 0.0)
            .unwrap_or(self.scoring.window_days);
        let trends = self.scorer.rank(&tagged, now, window_days);
        gauge!("trend_topics_ranked").set(trends.len() as f64);

        let report = ReportBuilder::new(now)
            .window(opts.window)
            .limits(opts.limits)
            .build(&trends, &tagged);

        info!(
            target: "trend",
            items = item_count,
            malformed = prepared.malformed,
            out_of_window = prepared.out_of_window,
            groups = report.summary.dedup_groups,
            topics = report.summary.trending_topics,
            top = ?report.top_topics(3),
            "trend run finished"
        );

        Ok(RunOutcome {
            report,
            diagnostics: prepared.diagnostics,
        })
    }

    /// Gather from providers, then run. Provider-level diagnostics come first.
    /// An origin already flagged by an empty provider is not flagged again.
    pub async fn run_providers(
        &self,
        providers: &[Box<dyn SourceProvider>],
        now: DateTime<Utc>,
        opts: &RunOptions,
    ) -> Result<RunOutcome, ConfigError> {
        let gathered = ingest::gather(providers).await;
        let mut outcome = self.run(gathered.items, now, opts)?;

        let flagged: BTreeSet<Origin> = gathered
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::PartialInput)
            .filter_map(|d| d.origin)
            .collect();
        outcome.diagnostics.retain(|d| {
            !(d.kind == DiagnosticKind::PartialInput
                && d.source.is_none()
                && d.origin.is_some_and(|o| flagged.contains(&o)))
        });

        let mut diagnostics = gathered.diagnostics;
        diagnostics.append(&mut outcome.diagnostics);
        outcome.diagnostics = diagnostics;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::KeywordGroup;
    use chrono::TimeZone;

    fn config() -> TrendConfig {
        let mut cfg = TrendConfig::default();
        cfg.topics.insert(
            "robotics".into(),
            KeywordGroup::new(["robotics", "robot learning"], 0.6),
        );
        cfg
    }

    #[test]
    fn bad_config_fails_before_any_item() {
        let mut cfg = config();
        cfg.scoring.dedup_threshold = -0.1;
        assert_eq!(
            TrendEngine::new(&cfg).unwrap_err(),
            ConfigError::InvalidThreshold(-0.1)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let engine = TrendEngine::new(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let opts = RunOptions {
            window: Some(Window {
                start: now,
                end: now - chrono::Duration::days(1),
            }),
            ..RunOptions::default()
        };
        assert!(matches!(
            engine.run(Vec::new(), now, &opts),
            Err(ConfigError::InvertedWindow { .. })
        ));
    }

    #[test]
    fn duplicate_topic_labels_fail_engine_construction() {
        let mut cfg = config();
        cfg.topics
            .insert("robotics ".into(), KeywordGroup::new(["humanoid"], 1.0));
        assert!(matches!(
            TrendEngine::new(&cfg),
            Err(ConfigError::DuplicateTopicLabel(_))
        ));
    }

    #[test]
    fn empty_batch_yields_empty_report() {
        let engine = TrendEngine::new(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let out = engine.run(Vec::new(), now, &RunOptions::default()).unwrap();
        assert!(out.report.trends.is_empty());
        assert!(out.report.groups.is_empty());
        // Both origins missing.
        assert_eq!(out.diagnostics.len(), 2);
    }

    #[test]
    fn untagged_groups_stay_visible() {
        let engine = TrendEngine::new(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let raw = vec![
            RawItem::new(Origin::Rss, "Feed", "Robot learning hits the warehouse").published(now),
            RawItem::new(Origin::Community, "Board", "Sourdough starter tips").published(now),
        ];
        let out = engine.run(raw, now, &RunOptions::default()).unwrap();
        assert_eq!(out.report.trends.len(), 1);
        assert_eq!(out.report.groups.len(), 2);
        assert!(out.report.groups[1].tags.is_empty());
        assert!(out.diagnostics.is_empty());
    }
}
