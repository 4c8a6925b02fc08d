//! Hybrid search combining text, cross-modal and keyword signals

use super::explain::why_chips;
use super::fusion::{collect_candidates, fuse, rank};
use super::reranker::{rerank_candidates, RerankProvider};
use super::{SearchRequest, SearchResult};
use crate::config::RetrievalConfig;
use crate::embedding::{normalize, query_terms, CrossModalProvider, EmbeddingProvider};
use crate::index::ArtifactBundle;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Vector search failed: {0}")]
    VectorSearchError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Hybrid searcher over an artifact bundle
///
/// Holds the query-time models only. The bundle is passed per call so a
/// request keeps the snapshot it started with.
pub struct HybridSearcher {
    text_provider: Arc<dyn EmbeddingProvider>,
    cross_modal: Arc<dyn CrossModalProvider>,
    reranker: Option<Arc<dyn RerankProvider>>,
    config: RetrievalConfig,
}

impl HybridSearcher {
    pub fn new(
        text_provider: Arc<dyn EmbeddingProvider>,
        cross_modal: Arc<dyn CrossModalProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            text_provider,
            cross_modal,
            reranker: None,
            config,
        }
    }

    pub fn with_reranker(mut self, reranker: Option<Arc<dyn RerankProvider>>) -> Self {
        self.reranker = reranker;
        self
    }

    /// Rank the bundle's catalog for a query
    ///
    /// Returns `min(k, catalog size)` results ordered by final score, ties
    /// broken by catalog row.
    pub fn search(
        &self,
        bundle: &ArtifactBundle,
        request: &SearchRequest,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if request.k == 0 {
            return Err(SearchError::InvalidQuery("k must be at least 1".to_string()));
        }
        request
            .weights
            .validate()
            .map_err(|e| SearchError::InvalidQuery(e.to_string()))?;

        if bundle.is_empty() {
            return Ok(Vec::new());
        }

        let k = request.k;

        // Step 1: Encode the query for both vector spaces
        let mut text_query = self
            .text_provider
            .embed(&request.query)
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?;
        normalize(&mut text_query);

        let mut image_query = self
            .cross_modal
            .embed_text(&request.query)
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?;
        normalize(&mut image_query);

        // Step 2: Exact top-k from each vector index
        let text_hits = bundle
            .text_index()
            .search(&text_query, k)
            .map_err(|e| SearchError::VectorSearchError(e.to_string()))?;
        let image_hits = bundle
            .image_index()
            .search(&image_query, k)
            .map_err(|e| SearchError::VectorSearchError(e.to_string()))?;

        // Step 3: Lexical scores for the whole catalog
        let keyword = bundle
            .keyword_index()
            .normalized_scores(&query_terms(&request.query));

        // Step 4: Candidate set and linear fusion
        let rows = collect_candidates(&text_hits, &image_hits, k, bundle.len());
        let mut candidates = fuse(&rows, &text_hits, &image_hits, &keyword, &request.weights);
        rank(&mut candidates);

        debug!(
            "Fused {} candidates ({} text hits, {} image hits)",
            candidates.len(),
            text_hits.len(),
            image_hits.len()
        );

        // Step 5: Optional cross-encoder pass
        if request.rerank {
            if let Some(reranker) = &self.reranker {
                match rerank_candidates(
                    reranker.as_ref(),
                    &request.query,
                    bundle.catalog(),
                    candidates.clone(),
                    self.config.rerank_prefix,
                    self.config.rerank_blend,
                ) {
                    Ok(reranked) => candidates = reranked,
                    Err(e) => warn!("Reranking skipped: {}", e),
                }
            }
        }

        // Step 6: Hydrate and explain
        let results = candidates
            .into_iter()
            .take(k)
            .filter_map(|candidate| {
                let product = bundle.catalog().get(candidate.row)?;
                Some(SearchResult {
                    row: candidate.row,
                    why_chips: why_chips(&request.query, product, &candidate),
                    product: product.clone(),
                    score: candidate.score,
                    score_text: candidate.text,
                    score_img: candidate.image,
                    score_kw: candidate.keyword,
                })
            })
            .collect();

        Ok(results)
    }
}
