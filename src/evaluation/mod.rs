//! Offline evaluation harness
//!
//! Runs a batch of queries and reports hit@1, recall@10, nDCG@10 and the
//! zero-result rate. Queries with relevance labels are judged against them;
//! unlabeled queries fall back to score-threshold heuristics.

use crate::error::{Result, VitrineError};
use crate::index::ArtifactBundle;
use crate::retrieval::{HybridSearcher, SearchError, SearchRequest, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Rank cut-off for recall and nDCG
pub const CUTOFF: usize = 10;

const HIT_THRESHOLD: f32 = 0.3;
const RECALL_THRESHOLD: f32 = 0.2;

/// Relevant product ids per query
pub type Labels = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub hit_at_1: f64,
    pub recall_at_10: f64,
    pub ndcg_at_10: f64,
    pub zero_result_rate: f64,
    pub total_queries: usize,
}

/// Something that can answer a query for the harness
pub trait QueryRunner {
    fn run(&self, query: &str) -> std::result::Result<Vec<SearchResult>, SearchError>;
}

impl<F> QueryRunner for F
where
    F: Fn(&str) -> std::result::Result<Vec<SearchResult>, SearchError>,
{
    fn run(&self, query: &str) -> std::result::Result<Vec<SearchResult>, SearchError> {
        self(query)
    }
}

/// Runs queries against one bundle snapshot with fixed request settings
pub struct BundleRunner<'a> {
    searcher: &'a HybridSearcher,
    bundle: &'a ArtifactBundle,
    template: SearchRequest,
}

impl<'a> BundleRunner<'a> {
    /// Uses the bundle's default weights
    pub fn new(searcher: &'a HybridSearcher, bundle: &'a ArtifactBundle, k: usize, rerank: bool) -> Self {
        let template = SearchRequest::new(String::new(), k)
            .with_weights(bundle.metadata().weights)
            .with_rerank(rerank);
        Self {
            searcher,
            bundle,
            template,
        }
    }
}

impl QueryRunner for BundleRunner<'_> {
    fn run(&self, query: &str) -> std::result::Result<Vec<SearchResult>, SearchError> {
        let mut request = self.template.clone();
        request.query = query.to_string();
        self.searcher.search(self.bundle, &request)
    }
}

#[derive(Debug, Default)]
struct Totals {
    hits: f64,
    recall: f64,
    ndcg: f64,
    zero_results: usize,
}

/// Evaluate every query; per-query failures count as zero results
pub fn evaluate<R: QueryRunner + ?Sized>(
    runner: &R,
    queries: &[String],
    labels: Option<&Labels>,
) -> EvaluationReport {
    if queries.is_empty() {
        return EvaluationReport::default();
    }

    let mut totals = Totals::default();

    for query in queries {
        let results = match runner.run(query) {
            Ok(results) => results,
            Err(e) => {
                warn!("Query {:?} failed: {}", query, e);
                totals.zero_results += 1;
                continue;
            }
        };

        if results.is_empty() {
            totals.zero_results += 1;
            continue;
        }

        let top = &results[..results.len().min(CUTOFF)];
        match labels.and_then(|l| l.get(query)) {
            Some(relevant) => score_labeled(top, relevant, &mut totals),
            None => score_heuristic(top, &mut totals),
        }
    }

    let n = queries.len() as f64;
    let report = EvaluationReport {
        hit_at_1: totals.hits / n,
        recall_at_10: totals.recall / n,
        ndcg_at_10: totals.ndcg / n,
        zero_result_rate: totals.zero_results as f64 / n,
        total_queries: queries.len(),
    };

    info!(
        "Evaluated {} queries: hit@1 {:.3}, recall@10 {:.3}, ndcg@10 {:.3}, zero-result {:.3}",
        report.total_queries,
        report.hit_at_1,
        report.recall_at_10,
        report.ndcg_at_10,
        report.zero_result_rate
    );

    report
}

fn score_heuristic(top: &[SearchResult], totals: &mut Totals) {
    let best = top[0].score;
    if best > HIT_THRESHOLD {
        totals.hits += 1.0;
    }
    if top.iter().any(|r| r.score > RECALL_THRESHOLD) {
        totals.recall += 1.0;
    }
    totals.ndcg += f64::from(best.min(1.0));
}

fn score_labeled(top: &[SearchResult], relevant: &[String], totals: &mut Totals) {
    let relevant: HashSet<&str> = relevant.iter().map(String::as_str).collect();

    if relevant.contains(top[0].product_id()) {
        totals.hits += 1.0;
    }

    if !relevant.is_empty() {
        let found: HashSet<&str> = top
            .iter()
            .map(SearchResult::product_id)
            .filter(|id| relevant.contains(id))
            .collect();
        totals.recall += found.len() as f64 / relevant.len() as f64;
    }

    let dcg: f64 = top
        .iter()
        .enumerate()
        .filter(|(_, r)| relevant.contains(r.product_id()))
        .map(|(rank, _)| gain(rank))
        .sum();
    let ideal: f64 = (0..relevant.len().min(CUTOFF)).map(gain).sum();
    if ideal > 0.0 {
        totals.ndcg += dcg / ideal;
    }
}

fn gain(rank: usize) -> f64 {
    1.0 / (rank as f64 + 2.0).log2()
}

/// One query per line, blank lines skipped
pub fn load_queries(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| VitrineError::io(e, format!("Failed to read queries file: {}", path.display())))?;

    let queries: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    debug!("Loaded {} queries from {}", queries.len(), path.display());
    Ok(queries)
}

/// JSON object mapping query text to relevant product ids
pub fn load_labels(path: &Path) -> Result<Labels> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| VitrineError::io(e, format!("Failed to read labels file: {}", path.display())))?;

    serde_json::from_str(&content)
        .map_err(|e| VitrineError::json(e, format!("Failed to parse labels file: {}", path.display())))
}
