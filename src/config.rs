//! Engine configuration: scoring knobs, keyword groups, source weights.
//!
//! File shape (TOML; JSON with the same structure also works):
//! ```toml
//! [scoring]
//! decay_base = 0.85
//! engagement_coeff = 0.1
//! spread_coeff = 0.15
//! dedup_threshold = 0.6
//! evidence_k = 3
//!
//! [topics.generative-media]
//! keywords = ["diffusion", "generative media"]
//! weight = 0.8
//!
//! [source_weights.weights]
//! "Hacker News" = 1.15
//! ```
//!
//! Every field has a default; an empty file is a valid config with no topics.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dedup::DEFAULT_DEDUP_THRESHOLD;
use crate::error::ConfigError;
use crate::source_weights::SourceWeights;
use crate::topics::{TopicConfig, TopicExtractor};

pub const ENV_CONFIG_PATH: &str = "TREND_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/trends.toml";
pub const DEFAULT_JSON_PATH: &str = "config/trends.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-day recency multiplier, in (0, 1).
    pub decay_base: f64,
    pub engagement_coeff: f64,
    pub spread_coeff: f64,
    /// Jaccard threshold for near-duplicate titles, in [0, 1].
    pub dedup_threshold: f64,
    /// Evidence groups kept per topic.
    pub evidence_k: usize,
    /// Age assigned to undated items when no explicit window is given.
    pub window_days: f64,
    /// Topics scoring below this are dropped.
    pub min_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            decay_base: 0.85,
            engagement_coeff: 0.1,
            spread_coeff: 0.15,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            evidence_k: 3,
            window_days: 7.0,
            min_score: 0.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.decay_base.is_finite() && self.decay_base > 0.0 && self.decay_base < 1.0) {
            return Err(ConfigError::InvalidDecayBase(self.decay_base));
        }
        for (name, value) in [
            ("engagement_coeff", self.engagement_coeff),
            ("spread_coeff", self.spread_coeff),
            ("window_days", self.window_days),
            ("min_score", self.min_score),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidCoefficient { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.dedup_threshold) {
            return Err(ConfigError::InvalidThreshold(self.dedup_threshold));
        }
        if self.evidence_k == 0 {
            return Err(ConfigError::InvalidEvidenceK);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub scoring: ScoringConfig,
    pub topics: TopicConfig,
    pub source_weights: SourceWeights,
}

impl TrendConfig {
    /// Fail-fast check of every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        TopicExtractor::new(&self.topics)?;
        self.source_weights.normalized()?;
        Ok(())
    }

    /// Load from an explicit path. TOML or JSON, picked by extension with a
    /// content-based fallback. The result is validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading trend config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing trend config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("validating trend config {}", path.display()))?;
        Ok(cfg)
    }

    /// Resolve config with fallbacks:
    /// 1) $TREND_CONFIG_PATH
    /// 2) config/trends.toml
    /// 3) config/trends.json
    /// 4) built-in defaults (no topics)
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        tracing::debug!(target: "trend", "no trend config found, using defaults");
        Ok(Self::default())
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<TrendConfig> {
    match hint_ext {
        "toml" => return Ok(toml::from_str(s)?),
        "json" => return Ok(serde_json::from_str(s)?),
        _ => {}
    }
    if s.trim_start().starts_with('{') {
        if let Ok(v) = serde_json::from_str(s) {
            return Ok(v);
        }
    }
    toml::from_str(s).map_err(|e| anyhow!("unsupported trend config format: {e}"))
}

/// Explicit look-back window. Items dated outside it are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvertedWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// `days` back from `end`. Negative counts are treated as zero.
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> Result<Self, ConfigError> {
        let start = chrono::Duration::try_days(days.max(0))
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or(ConfigError::WindowOutOfRange { days })?;
        Ok(Self { start, end })
    }

    /// Inclusive on both ends. Undated items are always inside.
    pub fn contains(&self, ts: Option<DateTime<Utc>>) -> bool {
        match ts {
            Some(t) => t >= self.start && t <= self.end,
            None => true,
        }
    }

    pub fn length_days(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 86_400_000.0
    }
}
