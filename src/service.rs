//! Query-serving facade
//!
//! Owns the encoders, the optional reranker and the bundle store. All
//! CPU-bound work (loading, searching, building) runs on the blocking pool so
//! callers on the async runtime are never stalled.

use crate::catalog::Catalog;
use crate::config::Config;
use crate::embedding::{CrossModalProvider, EmbeddingProvider};
use crate::error::{Result, VitrineError};
use crate::evaluation::{self, BundleRunner, EvaluationReport, Labels};
use crate::index::{BuildReport, BundleStore, IndexBuilder, StoreStatus};
use crate::retrieval::{HybridSearcher, RerankProvider, SearchRequest, SearchResult};
use std::sync::Arc;
use tracing::info;

pub struct SearchService {
    store: Arc<BundleStore>,
    searcher: Arc<HybridSearcher>,
    builder: IndexBuilder,
    config: Config,
}

impl SearchService {
    pub fn new(
        config: Config,
        store: Arc<BundleStore>,
        text_provider: Arc<dyn EmbeddingProvider>,
        cross_modal: Arc<dyn CrossModalProvider>,
        reranker: Option<Arc<dyn RerankProvider>>,
    ) -> Result<Self> {
        let builder = IndexBuilder::from_config(&config, text_provider.clone(), cross_modal.clone())?;
        let searcher = HybridSearcher::new(text_provider, cross_modal, config.retrieval.clone())
            .with_reranker(reranker);

        Ok(Self {
            store,
            searcher: Arc::new(searcher),
            builder,
            config,
        })
    }

    /// Request with the configured `k`, the active bundle's default weights
    /// and the configured rerank flag
    pub async fn default_request(&self, query: impl Into<String>) -> Result<SearchRequest> {
        let bundle = self.store.get_or_load().await?;
        Ok(SearchRequest::new(query, self.config.retrieval.default_k)
            .with_weights(bundle.metadata().weights)
            .with_rerank(self.config.retrieval.enable_reranking))
    }

    pub async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>> {
        let bundle = self.store.get_or_load().await?;
        let searcher = self.searcher.clone();

        let results = tokio::task::spawn_blocking(move || searcher.search(&bundle, &request))
            .await
            .map_err(|e| VitrineError::Other(anyhow::anyhow!("Search task failed: {}", e)))??;

        Ok(results)
    }

    /// Run the evaluation harness against one snapshot of the active bundle
    pub async fn evaluate(&self, queries: Vec<String>, labels: Option<Labels>) -> Result<EvaluationReport> {
        let bundle = self.store.get_or_load().await?;
        let searcher = self.searcher.clone();
        let k = self.config.evaluation.k;
        let rerank = self.config.retrieval.enable_reranking;

        tokio::task::spawn_blocking(move || {
            let runner = BundleRunner::new(&searcher, &bundle, k, rerank);
            evaluation::evaluate(&runner, &queries, labels.as_ref())
        })
        .await
        .map_err(|e| VitrineError::Other(anyhow::anyhow!("Evaluation task failed: {}", e)))
    }

    /// Build a new bundle from `catalog`, persist it and swap it in
    ///
    /// The current bundle keeps serving until the swap; a failed build leaves
    /// it untouched.
    pub async fn rebuild(&self, catalog: Catalog) -> Result<BuildReport> {
        info!("Rebuilding indices for {} products", catalog.len());

        let builder = self.builder.clone();
        let (bundle, report) = tokio::task::spawn_blocking(move || builder.build(catalog))
            .await
            .map_err(|e| VitrineError::Build(format!("Build task failed: {}", e)))??;

        self.store.replace(bundle).await?;
        Ok(report)
    }

    pub fn status(&self) -> StoreStatus {
        self.store.status()
    }
}
