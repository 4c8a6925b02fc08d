//! Deterministic in-process encoders and fixtures shared by integration tests
#![allow(dead_code)]

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use vitrine::catalog::{Catalog, Product};
use vitrine::embedding::{
    tokenize, CrossModalProvider, EmbeddingError, EmbeddingProvider, KeywordIndex, VectorIndex,
};
use vitrine::index::{ArtifactBundle, BundleMetadata, BUNDLE_SCHEMA_VERSION};
use vitrine::retrieval::FusionWeights;

/// Bag-of-words embedder: every token adds 1 to a BLAKE3-chosen bucket.
/// Images are embedded from the words written in the image file.
pub struct HashEmbedder {
    dimension: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            name: format!("hash-{}", dimension),
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for token in tokenize(text) {
            let hash = blake3::hash(token.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&hash.as_bytes()[..8]);
            let bucket = (u64::from_le_bytes(bytes) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.encode(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

impl CrossModalProvider for HashEmbedder {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.encode(text))
    }

    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbeddingError> {
        let words = std::fs::read_to_string(path).map_err(|_| EmbeddingError::ImageUnavailable {
            path: path.to_path_buf(),
        })?;
        Ok(self.encode(&words))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Returns the same vector for every query
pub struct FixedQuery {
    vector: Vec<f32>,
}

impl FixedQuery {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

impl EmbeddingProvider for FixedQuery {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector.clone())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

impl CrossModalProvider for FixedQuery {
    fn embed_text(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector.clone())
    }

    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::ImageUnavailable {
            path: path.to_path_buf(),
        })
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

pub fn product(id: &str, title: &str, color: Option<&str>, material: Option<&str>) -> Product {
    let mut p = Product::new(id, title);
    p.color = color.map(str::to_string);
    p.material = material.map(str::to_string);
    p
}

/// Small fashion catalog; every product except `p6` has an image
pub fn fashion_catalog() -> Catalog {
    let mut products = vec![
        product("p1", "Red Linen Summer Dress", Some("red"), Some("linen")),
        product("p2", "Blue Denim Jacket", Some("blue"), Some("denim")),
        product("p3", "Black Leather Ankle Boots", Some("black"), Some("leather")),
        product("p4", "Red Wool Winter Coat", Some("red"), Some("wool")),
        product("p5", "White Cotton Shirt", Some("white"), Some("cotton")),
        product("p6", "Silk Scarf", None, Some("silk")),
        product("p7", "Green Linen Trousers", Some("green"), Some("linen")),
        product("p8", "Denim Skirt", Some("blue"), Some("denim")),
    ];

    for (i, p) in products.iter_mut().enumerate() {
        p.description = Some(format!("{} for everyday wear", p.title.to_lowercase()));
        if p.product_id != "p6" {
            p.image_path = Some(format!("/images/{}.jpg", i + 1));
        }
    }

    Catalog::from_products(products).unwrap()
}

/// Write one "image" per product containing its color and title words
pub fn write_images(root: &Path, catalog: &Catalog) {
    std::fs::create_dir_all(root.join("images")).unwrap();
    for product in catalog.iter() {
        if let Some(image) = product.primary_image() {
            let path = root.join(image.trim_start_matches('/'));
            std::fs::write(path, format!("{} {}", product.color(), product.title)).unwrap();
        }
    }
}

/// Bundle assembled from explicit vectors, lexical corpus derived from the catalog
pub fn bundle_from_vectors(
    catalog: Catalog,
    text_rows: &[Vec<f32>],
    image_rows: &[Vec<f32>],
) -> ArtifactBundle {
    let text_dim = text_rows[0].len();
    let img_dim = image_rows[0].len();
    let documents = catalog.iter().map(|p| tokenize(&p.lexical_text())).collect();

    let metadata = BundleMetadata {
        schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
        num_products: catalog.len(),
        text_dim,
        img_dim,
        weights: FusionWeights::default(),
        text_model: "fixed".to_string(),
        cross_modal_model: "fixed".to_string(),
        built_at: Utc::now(),
        checksums: BTreeMap::new(),
    };

    ArtifactBundle::new(
        catalog,
        VectorIndex::from_rows(text_dim, text_rows).unwrap(),
        VectorIndex::from_rows(img_dim, image_rows).unwrap(),
        KeywordIndex::new(documents),
        metadata,
    )
    .unwrap()
}
