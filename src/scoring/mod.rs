// src/scoring/mod.rs
//! Confidence scoring of gate survivors. Two strategies share the `Scorer` seam:
//! position trust (leans on the index's own ranking) and a tiered weighted model
//! (leans on catalog metadata).

pub mod position;
pub mod tiered;

use std::sync::Arc;

use crate::config::{GateTables, ScorerKind, ScoringConfig, Taxonomy};
use crate::model::{CatalogProduct, ScanClassification, ScoredMatch};
use crate::text;

pub use position::PositionTrustScorer;
pub use tiered::TieredScorer;

pub const PARTIAL_MATCH: &str = "Partial match";

/// One `ScoredMatch` per candidate it keeps, unsorted, confidence in <0.0, 1.0>.
pub trait Scorer: Send + Sync {
    fn score(&self, scan: &ScanClassification, candidates: &[CatalogProduct]) -> Vec<ScoredMatch>;
    fn name(&self) -> &'static str;
}

/// A sub-score with the labels it earns above the "excellent" and "good" bars.
#[derive(Debug, Clone, Copy)]
pub struct Tier {
    pub value: f32,
    pub excellent: &'static str,
    pub good: &'static str,
}

impl Tier {
    pub fn new(value: f32, excellent: &'static str, good: &'static str) -> Self {
        Self {
            value,
            excellent,
            good,
        }
    }
}

/// Builds the short explanation from the tiers that cleared a bar.
#[derive(Debug, Clone, Copy)]
pub struct Explainer {
    pub excellent: f32,
    pub good: f32,
}

impl Explainer {
    pub fn from_config(cfg: &ScoringConfig) -> Self {
        Self {
            excellent: cfg.explain_excellent,
            good: cfg.explain_good,
        }
    }

    pub fn explain(&self, tiers: &[Tier]) -> String {
        let parts: Vec<&str> = tiers
            .iter()
            .filter_map(|t| {
                if t.value >= self.excellent {
                    Some(t.excellent)
                } else if t.value >= self.good {
                    Some(t.good)
                } else {
                    None
                }
            })
            .collect();
        if parts.is_empty() {
            PARTIAL_MATCH.to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl Default for Explainer {
    fn default() -> Self {
        Self {
            excellent: 0.9,
            good: 0.7,
        }
    }
}

/// Forms equal up to case, spacing and a plural "s".
pub(crate) fn same_form(a: &str, b: &str) -> bool {
    fn stem(s: &str) -> String {
        let n = text::normalize(s);
        match n.strip_suffix('s') {
            Some(stripped) if stripped.len() > 2 => stripped.to_string(),
            _ => n,
        }
    }
    let (a, b) = (stem(a), stem(b));
    !a.is_empty() && a == b
}

/// Scorer selected by `ScoringConfig::strategy`.
pub fn build_scorer(
    cfg: &ScoringConfig,
    taxonomy: Arc<Taxonomy>,
    gates: Arc<GateTables>,
) -> Arc<dyn Scorer> {
    match cfg.strategy {
        ScorerKind::PositionTrust => Arc::new(PositionTrustScorer::new(cfg, taxonomy, gates)),
        ScorerKind::Tiered => Arc::new(TieredScorer::new(cfg, taxonomy, gates)),
    }
}
