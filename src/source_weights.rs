//! # Source Weights
//!
//! Optional per-feed/per-board multipliers applied to a group's contribution,
//! keyed by the representative's sub-origin label (e.g. "Hacker News",
//! "MIT Technology Review").
//!
//! - Case-insensitive lookup with punctuation and dash normalization.
//! - Aliases map alternative spellings to a canonical label.
//! - Fallback order: alias → exact → longest substring → default.
//! - With nothing configured every source weighs `1.0`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWeights {
    /// Multiplier when no entry matches.
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    /// Canonical source label → multiplier (> 0).
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    /// Alternative label → canonical label.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

fn default_default_weight() -> f64 {
    1.0
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            default_weight: default_default_weight(),
            weights: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }
}

impl SourceWeights {
    /// Rebuild with normalized keys; rejects non-positive or non-finite weights.
    pub fn normalized(&self) -> Result<Self, ConfigError> {
        let check = |label: &str, w: f64| {
            if w.is_finite() && w > 0.0 {
                Ok(w)
            } else {
                Err(ConfigError::InvalidSourceWeight {
                    label: label.to_string(),
                    weight: w,
                })
            }
        };

        let default_weight = check("<default>", self.default_weight)?;
        let mut weights = BTreeMap::new();
        for (k, &w) in &self.weights {
            weights.insert(normalize(k), check(k, w)?);
        }
        let aliases = self
            .aliases
            .iter()
            .map(|(a, c)| (normalize(a), normalize(c)))
            .collect();

        Ok(Self {
            default_weight,
            weights,
            aliases,
        })
    }

    /// Weight for a sub-origin label. Expects `self` to come from `normalized()`.
    pub fn weight_for(&self, source: &str) -> f64 {
        let s = normalize(source);
        if s.is_empty() {
            return self.default_weight;
        }

        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&w) = self.weights.get(canon) {
                return w;
            }
        }

        if let Some(&w) = self.weights.get(&s) {
            return w;
        }

        // Longest key wins; BTreeMap order settles equal lengths.
        self.weights
            .iter()
            .filter(|(k, _)| !k.is_empty() && contains_words(&s, k))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, &w)| w)
            .unwrap_or(self.default_weight)
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Lowercase, dashes/punctuation to spaces, whitespace collapsed.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '‚', '’', '\''], " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `needle` occurs in `hay` on word boundaries.
fn contains_words(hay: &str, needle: &str) -> bool {
    format!(" {hay} ").contains(&format!(" {needle} "))
}
