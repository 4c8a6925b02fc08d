/// Offline bundle builder: embeds every catalog row and assembles the indices
use super::{ArtifactBundle, BundleMetadata, BundleSource, BUNDLE_SCHEMA_VERSION};
use crate::catalog::{Catalog, Product};
use crate::config::Config;
use crate::embedding::{
    normalize, tokenize, CrossModalProvider, EmbeddingError, EmbeddingProvider, KeywordIndex,
    VectorIndex,
};
use crate::error::{Result, VitrineError};
use crate::retrieval::FusionWeights;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of a build run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub rows: usize,
    /// Rows whose text embedding was replaced by a zero vector
    pub text_fallbacks: usize,
    /// Rows whose image embedding was replaced by a zero vector
    pub image_fallbacks: usize,
    pub duration_ms: u64,
}

/// Outcome of embedding one row
#[derive(Debug)]
enum RowEmbedding {
    Encoded(Vec<f32>),
    Fallback(EmbeddingError),
}

impl RowEmbedding {
    /// Row-local failures become a fallback, anything else aborts the build
    fn from_result(result: std::result::Result<Vec<f32>, EmbeddingError>) -> Result<Self> {
        match result {
            Ok(vector) => Ok(Self::Encoded(vector)),
            Err(e) if e.is_row_local() => Ok(Self::Fallback(e)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Builds an [`ArtifactBundle`] from a catalog
///
/// Text is embedded in batches of `batch_size`; a failed batch is retried row
/// by row so one bad input only costs its own row. Images are embedded one at
/// a time. Rows that cannot be encoded get a zero vector, which scores zero
/// against every unit-length query.
#[derive(Clone)]
pub struct IndexBuilder {
    text_provider: Arc<dyn EmbeddingProvider>,
    cross_modal: Arc<dyn CrossModalProvider>,
    image_root: PathBuf,
    batch_size: usize,
    weights: FusionWeights,
}

impl IndexBuilder {
    pub fn new(
        text_provider: Arc<dyn EmbeddingProvider>,
        cross_modal: Arc<dyn CrossModalProvider>,
        image_root: impl Into<PathBuf>,
        batch_size: usize,
        weights: FusionWeights,
    ) -> Self {
        Self {
            text_provider,
            cross_modal,
            image_root: image_root.into(),
            batch_size: batch_size.max(1),
            weights,
        }
    }

    pub fn from_config(
        config: &Config,
        text_provider: Arc<dyn EmbeddingProvider>,
        cross_modal: Arc<dyn CrossModalProvider>,
    ) -> Result<Self> {
        let retrieval = &config.retrieval;
        let weights = FusionWeights::new(
            retrieval.text_weight,
            retrieval.image_weight,
            retrieval.keyword_weight,
        )
        .map_err(|e| VitrineError::InvalidConfigValue {
            path: "retrieval".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self::new(
            text_provider,
            cross_modal,
            config.artifacts.image_root.clone(),
            config.embedding.batch_size,
            weights,
        ))
    }

    /// Build a complete bundle. Nothing is written to disk.
    pub fn build(&self, catalog: Catalog) -> Result<(ArtifactBundle, BuildReport)> {
        let start = std::time::Instant::now();

        if catalog.is_empty() {
            return Err(VitrineError::Build("Catalog is empty".to_string()));
        }

        info!("Building indices for {} products", catalog.len());

        let text_dim = self.text_provider.dimension();
        let img_dim = self.cross_modal.dimension();

        let text_rows = self.embed_texts(&catalog)?;
        let (text_vectors, text_fallbacks) = settle(text_rows, text_dim, "text")?;

        let image_rows = self.embed_images(&catalog)?;
        let (image_vectors, image_fallbacks) = settle(image_rows, img_dim, "image")?;

        let documents = catalog.iter().map(|p| tokenize(&p.lexical_text())).collect();

        let metadata = BundleMetadata {
            schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
            num_products: catalog.len(),
            text_dim,
            img_dim,
            weights: self.weights,
            text_model: self.text_provider.model_name().to_string(),
            cross_modal_model: self.cross_modal.model_name().to_string(),
            built_at: chrono::Utc::now(),
            checksums: BTreeMap::new(),
        };

        let rows = catalog.len();
        let bundle = ArtifactBundle::new(
            catalog,
            VectorIndex::from_rows(text_dim, &text_vectors)?,
            VectorIndex::from_rows(img_dim, &image_vectors)?,
            KeywordIndex::new(documents),
            metadata,
        )?;

        let report = BuildReport {
            rows,
            text_fallbacks,
            image_fallbacks,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Build complete: {} rows, {} text fallbacks, {} image fallbacks, {}ms",
            report.rows, report.text_fallbacks, report.image_fallbacks, report.duration_ms
        );

        Ok((bundle, report))
    }

    /// Build a bundle and persist it to `source`
    pub fn build_into(&self, catalog: Catalog, source: &dyn BundleSource) -> Result<BuildReport> {
        let (bundle, report) = self.build(catalog)?;
        source.persist(&bundle)?;
        info!("Persisted bundle to {}", source.describe());
        Ok(report)
    }

    fn embed_texts(&self, catalog: &Catalog) -> Result<Vec<RowEmbedding>> {
        let texts: Vec<String> = catalog.iter().map(Product::embedding_text).collect();
        let mut rows = Vec::with_capacity(texts.len());

        for (chunk_index, chunk) in texts.chunks(self.batch_size).enumerate() {
            match self.text_provider.embed_batch(chunk) {
                Ok(embeddings) if embeddings.len() == chunk.len() => {
                    rows.extend(embeddings.into_iter().map(RowEmbedding::Encoded));
                }
                Ok(embeddings) => {
                    warn!(
                        "Batch {} returned {} embeddings for {} texts, retrying per row",
                        chunk_index,
                        embeddings.len(),
                        chunk.len()
                    );
                    self.embed_rows(chunk, &mut rows)?;
                }
                Err(e) if e.is_row_local() => {
                    warn!("Batch {} failed ({}), retrying per row", chunk_index, e);
                    self.embed_rows(chunk, &mut rows)?;
                }
                Err(e) => return Err(e.into()),
            }
            debug!("Embedded text batch {} ({} rows)", chunk_index, chunk.len());
        }

        Ok(rows)
    }

    fn embed_rows(&self, texts: &[String], rows: &mut Vec<RowEmbedding>) -> Result<()> {
        for text in texts {
            rows.push(RowEmbedding::from_result(self.text_provider.embed(text))?);
        }
        Ok(())
    }

    fn embed_images(&self, catalog: &Catalog) -> Result<Vec<RowEmbedding>> {
        catalog
            .iter()
            .map(|product| match self.resolve_image(product) {
                Some(path) if path.is_file() => {
                    RowEmbedding::from_result(self.cross_modal.embed_image(&path))
                }
                Some(path) => Ok(RowEmbedding::Fallback(EmbeddingError::ImageUnavailable { path })),
                None => Ok(RowEmbedding::Fallback(EmbeddingError::InvalidInput(format!(
                    "Product {} has no image",
                    product.product_id
                )))),
            })
            .collect()
    }

    /// Image root joined with the primary image, leading slash stripped
    fn resolve_image(&self, product: &Product) -> Option<PathBuf> {
        let image = product.primary_image()?;
        Some(self.image_root.join(Path::new(image.trim_start_matches('/'))))
    }
}

/// Normalize encoded rows and substitute zero vectors for fallbacks
fn settle(rows: Vec<RowEmbedding>, dimension: usize, modality: &str) -> Result<(Vec<Vec<f32>>, usize)> {
    let mut fallbacks = 0;
    let mut vectors = Vec::with_capacity(rows.len());

    for (row, outcome) in rows.into_iter().enumerate() {
        match outcome {
            RowEmbedding::Encoded(mut vector) => {
                if vector.len() != dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: vector.len(),
                    }
                    .into());
                }
                normalize(&mut vector);
                vectors.push(vector);
            }
            RowEmbedding::Fallback(reason) => {
                warn!("Row {}: {} embedding replaced by zero vector: {}", row, modality, reason);
                fallbacks += 1;
                vectors.push(vec![0.0; dimension]);
            }
        }
    }

    Ok((vectors, fallbacks))
}
