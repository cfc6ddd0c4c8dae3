// src/rank.rs
//! Final ordering: confidence descending, ties by retrieval rank, top-K.

use std::cmp::Ordering;

use crate::model::ScoredMatch;

pub fn rank(mut matches: Vec<ScoredMatch>, top_k: usize) -> Vec<ScoredMatch> {
    // sort_by is stable; the explicit rank tie-break covers inputs that arrive shuffled
    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then(a.retrieval_rank.cmp(&b.retrieval_rank))
    });
    matches.truncate(top_k);
    matches
}
