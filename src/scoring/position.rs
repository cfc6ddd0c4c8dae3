// src/scoring/position.rs
//! Position-trust scoring: `min(1, w_name·name + w_pos·position + form_bonus)`.
//!
//! The index already ranked candidates by relevance; position keeps most of that
//! signal while the name score and form bonus reorder near-ties.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{same_form, Explainer, Scorer, Tier};
use crate::config::{GateTables, PositionWeights, ScoringConfig, Taxonomy};
use crate::model::{CatalogProduct, ScanClassification, ScoredMatch};
use crate::text::{self, has_phrase, has_root, roots_present};

pub struct PositionTrustScorer {
    weights: PositionWeights,
    explainer: Explainer,
    taxonomy: Arc<Taxonomy>,
    gates: Arc<GateTables>,
}

/// Scan-side words computed once per `score` call.
struct Query<'a> {
    phrase: String,
    words: Vec<String>,
    descriptors: Vec<&'a str>,
    form: Option<String>,
}

impl PositionTrustScorer {
    pub fn new(cfg: &ScoringConfig, taxonomy: Arc<Taxonomy>, gates: Arc<GateTables>) -> Self {
        Self {
            weights: cfg.position.clone(),
            explainer: Explainer::from_config(cfg),
            taxonomy,
            gates,
        }
    }

    fn query<'a>(&'a self, scan: &ScanClassification) -> Query<'a> {
        let type_words = text::words(&scan.product_type.raw);
        Query {
            phrase: type_words.join(" "),
            descriptors: roots_present(&type_words, &self.gates.descriptors),
            words: text::meaningful_words(&scan.product_type.raw),
            form: scan
                .form_raw()
                .map(text::normalize)
                .filter(|f| !f.is_empty() && !self.gates.unknown_forms.contains(f)),
        }
    }

    /// Name score, or None when the name carries no usable signal.
    fn name_score(&self, q: &Query<'_>, cand: &CatalogProduct) -> Option<f32> {
        let name_words = text::words(&cand.name);
        if !q.phrase.is_empty() && has_phrase(&name_words, &q.phrase) {
            return Some(1.0);
        }

        let shared = q
            .descriptors
            .iter()
            .filter(|d| has_root(&name_words, d))
            .count();
        let overlap = q.words.iter().filter(|w| has_root(&name_words, w)).count();

        if shared >= 2 {
            return Some(0.95);
        }
        if shared == 1 {
            let needed = q.words.len().saturating_sub(1);
            return Some(if overlap >= needed { 0.85 } else { 0.70 });
        }
        if overlap >= 2 {
            return Some(0.60);
        }
        let tags: Vec<String> = cand.tags.iter().map(|t| text::normalize(t)).collect();
        if q.words.iter().any(|w| tags.iter().any(|t| t.starts_with(w.as_str()))) {
            return Some(0.50);
        }
        None
    }

    /// (form sub-score, bonus): exact 1.0, compatible group 0.7, otherwise 0.
    fn form_signal(&self, q: &Query<'_>, cand: &CatalogProduct) -> (f32, f32) {
        let (Some(scanned), Some(other)) = (q.form.as_deref(), cand.form.as_deref()) else {
            return (0.0, 0.0);
        };
        if same_form(scanned, other) {
            (1.0, self.weights.exact_form_bonus)
        } else if self.taxonomy.forms_compatible(scanned, other) {
            (0.7, self.weights.compatible_form_bonus)
        } else {
            (0.0, 0.0)
        }
    }
}

impl Scorer for PositionTrustScorer {
    fn score(&self, scan: &ScanClassification, candidates: &[CatalogProduct]) -> Vec<ScoredMatch> {
        let q = self.query(scan);
        let total = candidates.len().max(1) as f32;
        let w = &self.weights;

        candidates
            .iter()
            .enumerate()
            .filter_map(|(index, cand)| {
                let Some(name) = self.name_score(&q, cand) else {
                    debug!(product_id = %cand.id, "no name signal, dropped");
                    return None;
                };
                let position = 1.0 - w.position_decay * (index as f32 / total);
                let (form, bonus) = self.form_signal(&q, cand);
                let confidence =
                    (w.name_weight * name + w.position_weight * position + bonus).min(1.0);

                let mut breakdown = BTreeMap::new();
                breakdown.insert("name".to_string(), name);
                breakdown.insert("position".to_string(), position);
                breakdown.insert("form".to_string(), form);
                breakdown.insert("form_bonus".to_string(), bonus);

                let explanation = self.explainer.explain(&[
                    Tier::new(name, "Strong name match", "Good name match"),
                    Tier::new(position, "Top search result", "High search ranking"),
                    Tier::new(form, "Exact form match", "Compatible form"),
                ]);
                Some(ScoredMatch::new(
                    cand.clone(),
                    confidence,
                    breakdown,
                    explanation,
                    index,
                ))
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "position_trust"
    }
}
