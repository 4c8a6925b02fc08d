//! Integration tests: hybrid retrieval over built and hand-assembled bundles

mod common;

use common::{bundle_from_vectors, fashion_catalog, product, write_images, FixedQuery, HashEmbedder};
use std::sync::Arc;
use tempfile::TempDir;
use vitrine::catalog::Catalog;
use vitrine::config::RetrievalConfig;
use vitrine::embedding::{normalize, EmbeddingProvider};
use vitrine::index::{ArtifactBundle, BuildReport, IndexBuilder};
use vitrine::retrieval::{
    FusionWeights, HybridSearcher, RerankError, RerankProvider, SearchError, SearchRequest,
    MAX_CHIPS,
};

fn hash_searcher() -> HybridSearcher {
    let embedder = Arc::new(HashEmbedder::new(64));
    HybridSearcher::new(embedder.clone(), embedder, RetrievalConfig::default())
}

fn build_fashion_bundle() -> (ArtifactBundle, BuildReport, TempDir) {
    let temp = TempDir::new().unwrap();
    let catalog = fashion_catalog();
    write_images(temp.path(), &catalog);

    let embedder = Arc::new(HashEmbedder::new(64));
    let builder = IndexBuilder::new(
        embedder.clone(),
        embedder,
        temp.path(),
        3,
        FusionWeights::default(),
    );
    let (bundle, report) = builder.build(catalog).unwrap();
    (bundle, report, temp)
}

fn ids(results: &[vitrine::retrieval::SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.product_id()).collect()
}

#[test]
fn test_fused_scores_order_three_items() {
    let catalog = Catalog::from_products(vec![
        product("A", "Silk Blouse", None, None),
        product("B", "Wool Coat", None, None),
        product("C", "Cotton Tee", None, None),
    ])
    .unwrap();

    let bundle = bundle_from_vectors(
        catalog,
        &[
            vec![0.9, (1.0f32 - 0.81).sqrt()],
            vec![0.1, (1.0f32 - 0.01).sqrt()],
            vec![0.0, 1.0],
        ],
        &[vec![0.0, 0.0], vec![0.0, 0.0], vec![0.0, 0.0]],
    );

    let query = Arc::new(FixedQuery::new(vec![1.0, 0.0]));
    let searcher = HybridSearcher::new(query.clone(), query, RetrievalConfig::default());

    let request = SearchRequest::new("silk", 3)
        .with_weights(FusionWeights::new(0.5, 0.3, 0.2).unwrap())
        .with_rerank(false);
    let results = searcher.search(&bundle, &request).unwrap();

    assert_eq!(ids(&results), vec!["A", "B", "C"]);
    assert!((results[0].score - 0.65).abs() < 1e-6);
    assert!((results[1].score - 0.05).abs() < 1e-6);
    assert!(results[2].score.abs() < 1e-6);

    assert_eq!(results[0].score_kw, 1.0);
    assert_eq!(results[1].score_kw, 0.0);
    assert!(results.iter().all(|r| r.score_img == 0.0));

    assert_eq!(
        results[0].why_chips,
        vec!["Title: silk", "Text similarity", "Keyword match"]
    );
}

#[test]
fn test_result_count_is_min_of_k_and_catalog() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let searcher = hash_searcher();

    for k in [1, 3, 8, 20] {
        let results = searcher
            .search(&bundle, &SearchRequest::new("denim", k).with_rerank(false))
            .unwrap();
        assert_eq!(results.len(), k.min(bundle.len()));
    }
}

#[test]
fn test_repeated_searches_are_identical() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let searcher = hash_searcher();
    let request = SearchRequest::new("red linen dress", 5);

    let first = searcher.search(&bundle, &request).unwrap();
    for _ in 0..5 {
        assert_eq!(searcher.search(&bundle, &request).unwrap(), first);
    }
}

#[test]
fn test_text_only_weights_follow_text_index() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let searcher = hash_searcher();
    let k = bundle.len();

    let request = SearchRequest::new("red linen", k)
        .with_weights(FusionWeights::new(1.0, 0.0, 0.0).unwrap())
        .with_rerank(false);
    let results = searcher.search(&bundle, &request).unwrap();

    let mut query = HashEmbedder::new(64).embed("red linen").unwrap();
    normalize(&mut query);
    let hits = bundle.text_index().search(&query, k).unwrap();

    let result_rows: Vec<usize> = results.iter().map(|r| r.row).collect();
    let hit_rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
    assert_eq!(result_rows, hit_rows);
    for (result, hit) in results.iter().zip(&hits) {
        assert_eq!(result.score, hit.score);
    }
}

#[test]
fn test_missing_image_scores_zero_visual_similarity() {
    let (bundle, report, _temp) = build_fashion_bundle();
    assert_eq!(report.image_fallbacks, 1);
    assert_eq!(report.text_fallbacks, 0);

    let searcher = hash_searcher();
    let request = SearchRequest::new("silk scarf", bundle.len())
        .with_weights(FusionWeights::new(0.0, 1.0, 0.0).unwrap())
        .with_rerank(false);
    let results = searcher.search(&bundle, &request).unwrap();

    let scarf = results.iter().find(|r| r.product_id() == "p6").unwrap();
    assert_eq!(scarf.score_img, 0.0);
    assert_eq!(scarf.score, 0.0);
}

#[test]
fn test_scores_and_chips_stay_in_bounds() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let searcher = hash_searcher();

    for query in ["red linen summer dress", "denim", "black leather boots", "", "???"] {
        let results = searcher
            .search(&bundle, &SearchRequest::new(query, 8))
            .unwrap();
        for result in &results {
            assert!((0.0..=1.0).contains(&result.score_kw));
            assert!(result.why_chips.len() <= MAX_CHIPS);
        }
    }
}

#[test]
fn test_empty_query_returns_backfilled_rows() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let searcher = hash_searcher();

    let results = searcher
        .search(&bundle, &SearchRequest::new("", 4).with_rerank(false))
        .unwrap();

    let rows: Vec<usize> = results.iter().map(|r| r.row).collect();
    assert_eq!(rows, vec![0, 1, 2, 3]);
    assert!(results.iter().all(|r| r.score == 0.0 && r.why_chips.is_empty()));
}

#[test]
fn test_invalid_requests_rejected() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let searcher = hash_searcher();

    let zero_k = searcher.search(&bundle, &SearchRequest::new("denim", 0));
    assert!(matches!(zero_k, Err(SearchError::InvalidQuery(_))));

    let mut negative = SearchRequest::new("denim", 5);
    negative.weights.keyword = -1.0;
    assert!(matches!(
        searcher.search(&bundle, &negative),
        Err(SearchError::InvalidQuery(_))
    ));
}

struct PrefersCoats;

impl RerankProvider for PrefersCoats {
    fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError> {
        Ok(documents
            .iter()
            .map(|d| if d.to_lowercase().contains("coat") { 5.0 } else { -5.0 })
            .collect())
    }

    fn model_name(&self) -> &str {
        "prefers-coats"
    }
}

struct Unavailable;

impl RerankProvider for Unavailable {
    fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>, RerankError> {
        Err(RerankError::RerankingError("model offline".to_string()))
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }
}

#[test]
fn test_reranker_blends_into_fused_scores() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let plain = hash_searcher();
    let reranking = hash_searcher().with_reranker(Some(Arc::new(PrefersCoats)));

    let request = SearchRequest::new("red", 8);
    let fused = plain
        .search(&bundle, &request.clone().with_rerank(false))
        .unwrap();
    let reranked = reranking.search(&bundle, &request).unwrap();

    assert_eq!(reranked[0].product_id(), "p4");

    let fused_coat = fused.iter().find(|r| r.product_id() == "p4").unwrap();
    assert!((reranked[0].score - (0.8 * fused_coat.score + 0.2)).abs() < 1e-5);

    for result in &reranked[1..] {
        let before = fused.iter().find(|r| r.row == result.row).unwrap();
        assert!((result.score - 0.8 * before.score).abs() < 1e-5);
    }
}

#[test]
fn test_rerank_flag_off_skips_reranker() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let plain = hash_searcher();
    let reranking = hash_searcher().with_reranker(Some(Arc::new(PrefersCoats)));

    let request = SearchRequest::new("denim jacket", 5).with_rerank(false);
    assert_eq!(
        reranking.search(&bundle, &request).unwrap(),
        plain.search(&bundle, &request).unwrap()
    );
}

#[test]
fn test_failing_reranker_keeps_fused_order() {
    let (bundle, _report, _temp) = build_fashion_bundle();
    let plain = hash_searcher();
    let failing = hash_searcher().with_reranker(Some(Arc::new(Unavailable)));

    let request = SearchRequest::new("white cotton shirt", 5);
    assert_eq!(
        failing.search(&bundle, &request).unwrap(),
        plain.search(&bundle, &request).unwrap()
    );
}
