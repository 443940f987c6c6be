//! Error taxonomy.
//!
//! Configuration problems are fatal and typed (`ConfigError`). Item-level
//! problems never abort a run; they are reported through `Diagnostic`
//! entries returned next to the report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::Origin;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("topic label must not be empty")]
    EmptyTopicLabel,

    #[error("topic label `{0}` is configured more than once")]
    DuplicateTopicLabel(String),

    #[error("topic `{topic}` has no usable keywords")]
    EmptyKeywords { topic: String },

    #[error("topic `{topic}` weight {weight} is outside (0, 1]")]
    InvalidTopicWeight { topic: String, weight: f64 },

    #[error("decay_base {0} is outside (0, 1)")]
    InvalidDecayBase(f64),

    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidCoefficient { name: &'static str, value: f64 },

    #[error("dedup_threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("evidence_k must be at least 1")]
    InvalidEvidenceK,

    #[error("source weight for `{label}` must be finite and > 0 (got {weight})")]
    InvalidSourceWeight { label: String, weight: f64 },

    #[error("window start {start} is after window end {end}")]
    InvertedWindow { start: String, end: String },

    #[error("a {days}-day window is out of the representable time range")]
    WindowOutOfRange { days: i64 },
}

/// Reasons a single raw item is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("item has no title")]
    MissingTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Item skipped because a required field was missing.
    MalformedItem,
    /// An origin or provider contributed no items to the batch.
    PartialInput,
    /// A provider failed outright; its items are missing from the batch.
    ProviderError,
}

/// Side-channel warning recorded during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    /// Sub-origin (feed/board) or provider name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn malformed(origin: Origin, source: &str, err: &ItemError) -> Self {
        Self {
            kind: DiagnosticKind::MalformedItem,
            origin: Some(origin),
            source: non_empty(source),
            message: err.to_string(),
        }
    }

    pub fn partial_input(origin: Option<Origin>, source: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::PartialInput,
            origin,
            source: source.and_then(non_empty),
            message: message.into(),
        }
    }

    pub fn provider_error(origin: Origin, provider: &str, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::ProviderError,
            origin: Some(origin),
            source: non_empty(provider),
            message: message.into(),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}
