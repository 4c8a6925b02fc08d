//! Weighted linear fusion of text, visual and keyword similarities

use crate::embedding::VectorHit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FusionError {
    #[error("Invalid weight configuration: {name} must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f32 },
}

/// Per-signal fusion weights
///
/// Weights need not sum to one. Zero disables a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub text: f32,
    pub image: f32,
    pub keyword: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            text: 0.5,
            image: 0.3,
            keyword: 0.2,
        }
    }
}

impl FusionWeights {
    pub fn new(text: f32, image: f32, keyword: f32) -> Result<Self, FusionError> {
        let weights = Self {
            text,
            image,
            keyword,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), FusionError> {
        for (name, value) in [
            ("text", self.text),
            ("image", self.image),
            ("keyword", self.keyword),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FusionError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

/// A catalog row with its per-signal and fused scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub row: usize,
    /// Fused score, later blended with the reranker score
    pub score: f32,
    pub text: f32,
    pub image: f32,
    pub keyword: f32,
}

/// Rows to score: the union of both vector top-k lists, topped up with the
/// lowest remaining rows until there are `k` (or the catalog runs out).
///
/// Returned in ascending row order.
pub fn collect_candidates(
    text_hits: &[VectorHit],
    image_hits: &[VectorHit],
    k: usize,
    catalog_len: usize,
) -> Vec<usize> {
    let mut rows: BTreeSet<usize> = text_hits
        .iter()
        .chain(image_hits)
        .map(|hit| hit.row)
        .filter(|row| *row < catalog_len)
        .collect();

    let target = k.min(catalog_len);
    let mut next = 0;
    while rows.len() < target {
        rows.insert(next);
        next += 1;
    }

    rows.into_iter().collect()
}

/// Score each candidate row
///
/// Vector similarities only count for rows inside that index's top-k; other
/// rows get 0 for that signal even if their true similarity is higher.
/// `keyword` holds the normalized BM25 score of every catalog row.
pub fn fuse(
    rows: &[usize],
    text_hits: &[VectorHit],
    image_hits: &[VectorHit],
    keyword: &[f32],
    weights: &FusionWeights,
) -> Vec<Candidate> {
    let text_scores = score_map(text_hits);
    let image_scores = score_map(image_hits);

    rows.iter()
        .map(|&row| {
            let text = text_scores.get(&row).copied().unwrap_or(0.0);
            let image = image_scores.get(&row).copied().unwrap_or(0.0);
            let keyword = keyword.get(row).copied().unwrap_or(0.0);
            Candidate {
                row,
                score: weights.text * text + weights.image * image + weights.keyword * keyword,
                text,
                image,
                keyword,
            }
        })
        .collect()
}

fn score_map(hits: &[VectorHit]) -> HashMap<usize, f32> {
    let mut scores = HashMap::with_capacity(hits.len());
    for hit in hits {
        scores.entry(hit.row).or_insert(hit.score);
    }
    scores
}

/// Sort by score descending, lower row first on ties
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.row.cmp(&b.row)));
}
