//! Hybrid Retrieval & Reranking
//!
//! This module ranks catalog products for a free-text query by fusing text
//! embedding similarity, cross-modal (query text vs. product image)
//! similarity and BM25 keyword relevance, with optional cross-encoder
//! reranking and explanation chips.

mod explain;
mod fusion;
mod hybrid;
mod reranker;

pub use explain::{why_chips, MAX_CHIPS};
pub use fusion::{collect_candidates, fuse, rank, Candidate, FusionError, FusionWeights};
pub use hybrid::{HybridSearcher, SearchError};
pub use reranker::{
    load_reranker, rerank_candidates, FastEmbedReranker, RerankError, RerankProvider,
};

use crate::catalog::Product;
use serde::{Deserialize, Serialize};

/// Search query with per-request weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text
    pub query: String,

    /// Maximum number of results
    pub k: usize,

    pub weights: FusionWeights,

    /// Apply the cross-encoder when one is available
    pub rerank: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, k: usize) -> Self {
        Self {
            query: query.into(),
            k,
            weights: FusionWeights::default(),
            rerank: true,
        }
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }
}

/// A ranked product with its score breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Catalog row ordinal
    pub row: usize,
    #[serde(flatten)]
    pub product: Product,
    /// Final score (fused, or blended with the reranker)
    pub score: f32,
    pub score_text: f32,
    pub score_img: f32,
    pub score_kw: f32,
    pub why_chips: Vec<String>,
}

impl SearchResult {
    pub fn product_id(&self) -> &str {
        &self.product.product_id
    }
}
