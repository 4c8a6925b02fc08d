/// BM25 (Okapi) lexical index over pre-tokenized documents
use ahash::AHashMap;

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f64,
    /// Document length normalization
    pub b: f64,
    /// Fraction of the average idf given to terms whose idf would be negative
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Tokenize a catalog document: lowercase, commas and periods become spaces,
/// split on whitespace. No stemming or stopword removal.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace([',', '.'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Tokenize a query: lowercase and split on whitespace. Punctuation is kept,
/// so "dress," does not match the document token "dress".
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Okapi BM25 statistics
///
/// Holds one token list per catalog row. All statistics are derived from the
/// corpus at construction time, so the same corpus always scores identically.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    documents: Vec<Vec<String>>,
    term_freqs: Vec<AHashMap<String, u32>>,
    doc_lens: Vec<f64>,
    idf: AHashMap<String, f64>,
    avgdl: f64,
    params: Bm25Params,
}

impl KeywordIndex {
    /// Build the index with default parameters
    pub fn new(documents: Vec<Vec<String>>) -> Self {
        Self::with_params(documents, Bm25Params::default())
    }

    pub fn with_params(documents: Vec<Vec<String>>, params: Bm25Params) -> Self {
        let mut term_freqs = Vec::with_capacity(documents.len());
        let mut doc_lens = Vec::with_capacity(documents.len());
        // Vocabulary in first-seen order keeps the idf sum reproducible.
        let mut vocabulary: Vec<String> = Vec::new();
        let mut doc_counts: AHashMap<String, u32> = AHashMap::new();
        let mut total_tokens = 0usize;

        for document in &documents {
            doc_lens.push(document.len() as f64);
            total_tokens += document.len();

            let mut freqs: AHashMap<String, u32> = AHashMap::new();
            let mut first_seen: Vec<&String> = Vec::new();
            for token in document {
                let count = freqs.entry(token.clone()).or_insert(0);
                if *count == 0 {
                    first_seen.push(token);
                }
                *count += 1;
            }

            for token in first_seen {
                let count = doc_counts.entry(token.clone()).or_insert(0);
                if *count == 0 {
                    vocabulary.push(token.clone());
                }
                *count += 1;
            }

            term_freqs.push(freqs);
        }

        let avgdl = if documents.is_empty() {
            0.0
        } else {
            total_tokens as f64 / documents.len() as f64
        };

        let idf = Self::compute_idf(documents.len(), &vocabulary, &doc_counts, params.epsilon);

        Self {
            documents,
            term_freqs,
            doc_lens,
            idf,
            avgdl,
            params,
        }
    }

    fn compute_idf(
        corpus_size: usize,
        vocabulary: &[String],
        doc_counts: &AHashMap<String, u32>,
        epsilon: f64,
    ) -> AHashMap<String, f64> {
        let n = corpus_size as f64;
        let mut idf = AHashMap::with_capacity(vocabulary.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();

        for term in vocabulary {
            let df = doc_counts.get(term).copied().unwrap_or(0) as f64;
            let value = (n - df + 0.5).ln() - (df + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term);
            }
            idf.insert(term.clone(), value);
        }

        if !vocabulary.is_empty() {
            let floor = epsilon * (idf_sum / vocabulary.len() as f64);
            for term in negative {
                idf.insert(term.clone(), floor);
            }
        }

        idf
    }

    /// Raw BM25 score of every document for the query terms, in row order
    ///
    /// Repeated query terms contribute once per occurrence.
    pub fn scores(&self, query_terms: &[String]) -> Vec<f64> {
        let mut scores = vec![0.0; self.documents.len()];
        if self.avgdl == 0.0 {
            return scores;
        }

        let Bm25Params { k1, b, .. } = self.params;

        for term in query_terms {
            let idf = self.idf.get(term).copied().unwrap_or(0.0);
            for (row, score) in scores.iter_mut().enumerate() {
                let tf = self.term_freqs[row].get(term).copied().unwrap_or(0) as f64;
                let dl = self.doc_lens[row];
                *score += idf * (tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * dl / self.avgdl)));
            }
        }

        scores
    }

    /// Scores divided by the corpus maximum, clamped to [0, 1].
    /// All zeros when nothing scores above zero.
    pub fn normalized_scores(&self, query_terms: &[String]) -> Vec<f32> {
        normalize_by_max(&self.scores(query_terms))
    }

    /// Inverse document frequency of a term, if it occurs in the corpus
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// Token lists in row order
    pub fn documents(&self) -> &[Vec<String>] {
        &self.documents
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Divide by the maximum so the best document scores 1.0
pub fn normalize_by_max(scores: &[f64]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_nan() || max <= 0.0 {
        return vec![0.0; scores.len()];
    }
    scores
        .iter()
        .map(|s| (s / max).clamp(0.0, 1.0) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(docs: &[&str]) -> Vec<Vec<String>> {
        docs.iter().map(|d| tokenize(d)).collect()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Red Dress, Cotton.Blend  summer"),
            vec!["red", "dress", "cotton", "blend", "summer"]
        );
        assert!(tokenize("").is_empty());
        assert!(tokenize(" , . ").is_empty());
    }

    #[test]
    fn test_query_terms_keep_punctuation() {
        assert_eq!(query_terms("Red  Dress,"), vec!["red", "dress,"]);
        assert!(query_terms("   ").is_empty());
    }

    #[test]
    fn test_matches_okapi_reference_values() {
        // Reference values computed with BM25Okapi(k1=1.5, b=0.75, epsilon=0.25).
        let index = KeywordIndex::new(corpus(&[
            "red silk dress",
            "blue denim jacket",
            "red wool coat red",
        ]));

        // N=3, df(red)=2 -> idf = ln(1.5) - ln(2.5)
        let idf_red = 1.5f64.ln() - 2.5f64.ln();
        assert!(idf_red < 0.0);
        // Negative idf is floored to epsilon * mean idf over the vocabulary.
        let idf_rare = 2.5f64.ln() - 1.5f64.ln();
        let mean = (idf_red + 7.0 * idf_rare) / 8.0;
        assert!((index.idf("red").unwrap() - 0.25 * mean).abs() < 1e-12);
        assert!((index.idf("silk").unwrap() - idf_rare).abs() < 1e-12);

        let scores = index.scores(&["silk".to_string()]);
        let avgdl = 10.0 / 3.0;
        let expected = idf_rare * (1.0 * 2.5 / (1.0 + 1.5 * (1.0 - 0.75 + 0.75 * 3.0 / avgdl)));
        assert!((scores[0] - expected).abs() < 1e-12);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_repeated_query_terms_accumulate() {
        let index = KeywordIndex::new(corpus(&["linen shirt", "wool coat", "silk scarf"]));
        let once = index.scores(&["linen".to_string()]);
        let twice = index.scores(&["linen".to_string(), "linen".to_string()]);
        assert!((twice[0] - 2.0 * once[0]).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_scores_in_unit_range() {
        let index = KeywordIndex::new(corpus(&[
            "red dress",
            "red shoes",
            "red coat",
            "blue dress",
        ]));

        let normalized = index.normalized_scores(&query_terms("red dress"));
        assert!(normalized.iter().all(|s| (0.0..=1.0).contains(s)));
        assert!(normalized.iter().any(|s| *s == 1.0));
    }

    #[test]
    fn test_no_match_is_all_zero() {
        let index = KeywordIndex::new(corpus(&["red dress", "blue coat"]));
        assert_eq!(index.normalized_scores(&query_terms("sneakers")), vec![0.0, 0.0]);
        assert_eq!(index.normalized_scores(&[]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_empty_documents() {
        let index = KeywordIndex::new(vec![Vec::new(), Vec::new()]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.scores(&query_terms("anything")), vec![0.0, 0.0]);
    }

    #[test]
    fn test_normalize_by_max_clamps_negative() {
        assert_eq!(normalize_by_max(&[2.0, 1.0, -0.5]), vec![1.0, 0.5, 0.0]);
        assert_eq!(normalize_by_max(&[-1.0, -2.0]), vec![0.0, 0.0]);
        assert!(normalize_by_max(&[]).is_empty());
    }
}
