/// Embedding provider traits and FastEmbed implementations
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image unavailable: {}", path.display())]
    ImageUnavailable { path: PathBuf },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Whether the failure belongs to a single input and can be replaced by a
    /// zero vector. Model and dimension errors affect every row.
    pub fn is_row_local(&self) -> bool {
        matches!(
            self,
            Self::GenerationError(_) | Self::InvalidInput(_) | Self::ImageUnavailable { .. }
        )
    }
}

/// Text embedding backend
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts, one per input in order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Joint text/image embedding backend (CLIP style): queries are embedded as
/// text into the same space the catalog images live in.
pub trait CrossModalProvider: Send + Sync {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbeddingError>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

fn check_dimension(expected: usize, embedding: &[f32]) -> Result<(), EmbeddingError> {
    if embedding.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}

/// FastEmbed provider for local text embedding
///
/// Uses all-MiniLM-L6-v2 (384 dimensions) by default.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// Models are downloaded to `~/.cache/huggingface/` on first use.
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported text model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Initializing text embedding model: {} ({}D)",
            model_name,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))?;

        check_dimension(self.dimension, &embedding)?;
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Embedding count mismatch: expected {}, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        for embedding in &embeddings {
            check_dimension(self.dimension, embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// CLIP ViT-B/32 through FastEmbed: the text tower for queries, the vision
/// tower for catalog images. Both produce 512-dimensional vectors.
pub struct FastEmbedClipProvider {
    text_model: Arc<TextEmbedding>,
    image_model: Arc<ImageEmbedding>,
    model_name: String,
}

impl FastEmbedClipProvider {
    const DIMENSION: usize = 512;

    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        match model_name {
            "clip-ViT-B-32" | "clip-vit-b-32" => {}
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported cross-modal model: {}. Supported: clip-ViT-B-32",
                    model_name
                )));
            }
        }

        tracing::info!(
            "Initializing cross-modal model: {} ({}D)",
            model_name,
            Self::DIMENSION
        );

        let text_model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::ClipVitB32).with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        let image_model = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                .with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            text_model: Arc::new(text_model),
            image_model: Arc::new(image_model),
            model_name: model_name.to_string(),
        })
    }
}

impl CrossModalProvider for FastEmbedClipProvider {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embedding = self
            .text_model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))?;

        check_dimension(Self::DIMENSION, &embedding)?;
        Ok(embedding)
    }

    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbeddingError> {
        if !path.is_file() {
            return Err(EmbeddingError::ImageUnavailable {
                path: path.to_path_buf(),
            });
        }

        // Decode failures surface here as generation errors and stay row-local.
        let embedding = self
            .image_model
            .embed(vec![path], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))?;

        check_dimension(Self::DIMENSION, &embedding)?;
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
