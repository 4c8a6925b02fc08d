//! Artifact bundle: the immutable, mutually consistent set of indices the
//! query engine serves from.

mod builder;
mod persist;
mod store;

pub use builder::{BuildReport, IndexBuilder};
pub use persist::{BundleSource, DirectorySource};
pub use store::{BundleStore, StoreStatus};

use crate::catalog::Catalog;
use crate::embedding::{KeywordIndex, VectorIndex};
use crate::error::{Result, VitrineError};
use crate::retrieval::FusionWeights;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BUNDLE_SCHEMA_VERSION: &str = "1";

/// Metadata record persisted next to the indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub schema_version: String,
    pub num_products: usize,
    pub text_dim: usize,
    pub img_dim: usize,
    /// Fusion weights used when a query does not specify its own
    pub weights: FusionWeights,
    pub text_model: String,
    pub cross_modal_model: String,
    pub built_at: DateTime<Utc>,
    /// BLAKE3 digest per artifact file, filled in when the bundle is saved
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

/// Catalog plus the three indices built from it
///
/// Row `i` of the catalog, of both vector indices and of the lexical corpus
/// all describe the same product. The constructor enforces this, so a bundle
/// value is always consistent.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    catalog: Catalog,
    text_index: VectorIndex,
    image_index: VectorIndex,
    keyword_index: KeywordIndex,
    metadata: BundleMetadata,
}

impl ArtifactBundle {
    pub fn new(
        catalog: Catalog,
        text_index: VectorIndex,
        image_index: VectorIndex,
        keyword_index: KeywordIndex,
        metadata: BundleMetadata,
    ) -> Result<Self> {
        let bundle = Self {
            catalog,
            text_index,
            image_index,
            keyword_index,
            metadata,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    fn validate(&self) -> Result<()> {
        let n = self.catalog.len();
        let mismatch = |what: &str, actual: usize, expected: usize| {
            VitrineError::ArtifactIntegrity(format!(
                "{} has {} rows/dims but {} were expected",
                what, actual, expected
            ))
        };

        if self.metadata.num_products != n {
            return Err(mismatch("metadata.num_products", self.metadata.num_products, n));
        }
        if self.text_index.len() != n {
            return Err(mismatch("text index", self.text_index.len(), n));
        }
        if self.image_index.len() != n {
            return Err(mismatch("image index", self.image_index.len(), n));
        }
        if self.keyword_index.len() != n {
            return Err(mismatch("lexical corpus", self.keyword_index.len(), n));
        }
        if self.text_index.dimension() != self.metadata.text_dim {
            return Err(mismatch(
                "text embeddings",
                self.text_index.dimension(),
                self.metadata.text_dim,
            ));
        }
        if self.image_index.dimension() != self.metadata.img_dim {
            return Err(mismatch(
                "image embeddings",
                self.image_index.dimension(),
                self.metadata.img_dim,
            ));
        }

        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn text_index(&self) -> &VectorIndex {
        &self.text_index
    }

    pub fn image_index(&self) -> &VectorIndex {
        &self.image_index
    }

    pub fn keyword_index(&self) -> &KeywordIndex {
        &self.keyword_index
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Product;
    use crate::embedding::tokenize;

    fn metadata(n: usize, text_dim: usize, img_dim: usize) -> BundleMetadata {
        BundleMetadata {
            schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
            num_products: n,
            text_dim,
            img_dim,
            weights: FusionWeights::default(),
            text_model: "test-text".to_string(),
            cross_modal_model: "test-clip".to_string(),
            built_at: Utc::now(),
            checksums: BTreeMap::new(),
        }
    }

    fn catalog(n: usize) -> Catalog {
        Catalog::from_products(
            (0..n)
                .map(|i| Product::new(format!("p{}", i), format!("Item {}", i)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_consistent_bundle() {
        let bundle = ArtifactBundle::new(
            catalog(2),
            VectorIndex::from_rows(2, &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap(),
            VectorIndex::from_rows(3, &[vec![0.0; 3], vec![0.0; 3]]).unwrap(),
            KeywordIndex::new(vec![tokenize("item 0"), tokenize("item 1")]),
            metadata(2, 2, 3),
        )
        .unwrap();

        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let result = ArtifactBundle::new(
            catalog(2),
            VectorIndex::from_rows(2, &[vec![1.0, 0.0]]).unwrap(),
            VectorIndex::from_rows(3, &[vec![0.0; 3], vec![0.0; 3]]).unwrap(),
            KeywordIndex::new(vec![Vec::new(), Vec::new()]),
            metadata(2, 2, 3),
        );

        assert!(matches!(result, Err(VitrineError::ArtifactIntegrity(_))));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = ArtifactBundle::new(
            catalog(1),
            VectorIndex::from_rows(2, &[vec![1.0, 0.0]]).unwrap(),
            VectorIndex::from_rows(3, &[vec![0.0; 3]]).unwrap(),
            KeywordIndex::new(vec![Vec::new()]),
            metadata(1, 4, 3),
        );

        assert!(matches!(result, Err(VitrineError::ArtifactIntegrity(_))));
    }
}
