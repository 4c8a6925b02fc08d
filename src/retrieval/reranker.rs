//! Cross-encoder reranking using FastEmbed

use super::fusion::Candidate;
use crate::catalog::{Catalog, Product};
use crate::config::RetrievalConfig;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Reranker returned {actual} scores for {expected} documents")]
    ScoreCountMismatch { expected: usize, actual: usize },
}

/// Scores (query, document) pairs; higher means more relevant
pub trait RerankProvider: Send + Sync {
    /// One raw score per document, in input order
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError>;

    fn model_name(&self) -> &str;
}

/// Cross-encoder reranker backed by FastEmbed
pub struct FastEmbedReranker {
    model: Arc<TextRerank>,
    model_name: String,
}

impl FastEmbedReranker {
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let model = match model_name {
            "BAAI/bge-reranker-base" | "bge-reranker-base" => RerankerModel::BGERerankerBase,
            _ => {
                return Err(RerankError::InitializationError(format!(
                    "Unsupported reranker model: {}. Supported: BAAI/bge-reranker-base",
                    model_name
                )));
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(model).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }
}

impl RerankProvider for FastEmbedReranker {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
        let results = self
            .model
            .rerank(query, docs, false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        // Results come back sorted by score; put them back in input order.
        let mut scores = vec![None; documents.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = Some(result.score);
            }
        }

        scores
            .into_iter()
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| RerankError::RerankingError("Missing score for a document".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Construct the configured reranker. An unavailable model disables
/// reranking instead of failing the service.
pub fn load_reranker(config: &RetrievalConfig) -> Option<Arc<dyn RerankProvider>> {
    if !config.enable_reranking {
        return None;
    }

    match FastEmbedReranker::new(&config.reranker_model) {
        Ok(reranker) => Some(Arc::new(reranker)),
        Err(e) => {
            tracing::warn!("Reranking disabled: {}", e);
            None
        }
    }
}

/// Blend reranker scores into the first `prefix_len` candidates
///
/// Raw scores are min-max normalized over the prefix, then
/// `blend * fused + (1 - blend) * normalized` replaces the candidate score.
/// The prefix and the untouched suffix are merged and stable-sorted by score.
pub fn rerank_candidates(
    reranker: &dyn RerankProvider,
    query: &str,
    catalog: &Catalog,
    mut candidates: Vec<Candidate>,
    prefix_len: usize,
    blend: f32,
) -> Result<Vec<Candidate>, RerankError> {
    let split = prefix_len.min(candidates.len());
    if split == 0 {
        return Ok(candidates);
    }

    let suffix = candidates.split_off(split);
    let mut prefix = candidates;

    let documents: Vec<String> = prefix
        .iter()
        .map(|c| catalog.get(c.row).map(Product::rerank_text).unwrap_or_default())
        .collect();

    let raw = reranker.score(query, &documents)?;
    if raw.len() != prefix.len() {
        return Err(RerankError::ScoreCountMismatch {
            expected: prefix.len(),
            actual: raw.len(),
        });
    }

    for (candidate, normalized) in prefix.iter_mut().zip(min_max_normalize(&raw)) {
        candidate.score = blend * candidate.score + (1.0 - blend) * normalized;
    }

    let mut merged = prefix;
    merged.extend(suffix);
    merged.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(merged)
}

fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    scores
        .iter()
        .map(|s| (s - min) / (max - min + 1e-8))
        .collect()
}
