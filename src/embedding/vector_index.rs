/// Exact inner-product vector index
use ndarray::{Array2, ArrayView1};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid matrix: {0}")]
    InvalidMatrix(String),
}

/// Search result with row ordinal and similarity score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    /// Catalog row ordinal
    pub row: usize,
    /// Inner product with the query (cosine similarity for unit vectors)
    pub score: f32,
}

/// Flat index over a row-major embedding matrix
///
/// Every search scans all rows, so results are exact. Rows are expected to be
/// unit length (or all zero), which makes the inner product a cosine
/// similarity. The index is built once and only read afterwards.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Array2<f32>,
}

impl VectorIndex {
    /// Create an empty index of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dimension)),
        }
    }

    /// Build an index from one vector per row
    pub fn from_rows(dimension: usize, rows: &[Vec<f32>]) -> Result<Self, VectorIndexError> {
        let mut flat = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            if row.len() != dimension {
                return Err(VectorIndexError::InvalidDimension {
                    expected: dimension,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }

        let vectors = Array2::from_shape_vec((rows.len(), dimension), flat)
            .map_err(|e| VectorIndexError::InvalidMatrix(e.to_string()))?;

        Ok(Self { vectors })
    }

    /// Wrap an existing matrix (rows = items, columns = dimensions)
    pub fn from_matrix(vectors: Array2<f32>) -> Self {
        Self { vectors }
    }

    /// Search for the k rows with the highest inner product
    ///
    /// Results are sorted by score descending; equal scores keep row order,
    /// so the ranking is fully deterministic. Returns `min(k, len)` hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorIndexError> {
        if query.len() != self.dimension() {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let scores = self.vectors.dot(&ArrayView1::from(query));

        let mut hits: Vec<VectorHit> = scores
            .iter()
            .enumerate()
            .map(|(row, &score)| VectorHit { row, score })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.row.cmp(&b.row)));
        hits.truncate(k);

        Ok(hits)
    }

    /// Stored vector for a row
    pub fn vector(&self, row: usize) -> Option<ArrayView1<'_, f32>> {
        (row < self.len()).then(|| self.vectors.row(row))
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.vectors
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }
}
