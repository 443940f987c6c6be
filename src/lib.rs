// src/lib.rs
// Public library surface for integration tests and embedding services.

pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod item;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod sentiment;
pub mod source_weights;
pub mod topics;

// ---- Re-exports for stable public API ----
pub use crate::config::{ScoringConfig, TrendConfig, Window};
pub use crate::dedup::{DedupGroup, Deduplicator};
pub use crate::error::{ConfigError, Diagnostic, DiagnosticKind, ItemError};
pub use crate::ingest::types::SourceProvider;
pub use crate::item::{normalize_title, normalize_url, Origin, RawItem, SourceItem};
pub use crate::pipeline::{RunOptions, RunOutcome, TrendEngine};
pub use crate::report::{AggregationReport, DataSummary, ReportBuilder, ReportLimits};
pub use crate::scoring::{Evidence, TrendEntry, TrendScorer};
pub use crate::sentiment::{Sentiment, SentimentBreakdown, SentimentShift, ShiftDirection};
pub use crate::source_weights::SourceWeights;
pub use crate::topics::{KeywordGroup, TaggedGroup, TopicConfig, TopicExtractor, TopicTag};

use chrono::{DateTime, Utc};

/// One-shot convenience: validate `config`, then run a batch with default options.
///
/// ```ignore
/// let outcome = trend_engine::run(items, &config, chrono::Utc::now())?;
/// println!("{}", outcome.report.to_json_pretty()?);
/// ```
pub fn run(
    items: Vec<RawItem>,
    config: &TrendConfig,
    now: DateTime<Utc>,
) -> Result<RunOutcome, ConfigError> {
    TrendEngine::new(config)?.run(items, now, &RunOptions::default())
}
