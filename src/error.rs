use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::{EmbeddingError, VectorIndexError};
use crate::retrieval::SearchError;

/// Main error type for Vitrine
#[derive(Error, Debug)]
pub enum VitrineError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Catalog input could not be turned into a valid catalog
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Two catalog rows share a product id
    #[error("Duplicate product id in catalog: {id}")]
    DuplicateProduct { id: String },

    /// An artifact file expected in the bundle directory is absent
    #[error("Artifact not found: {path}")]
    ArtifactMissing { path: PathBuf },

    /// Bundle pieces disagree with each other or with their metadata
    #[error("Artifact integrity check failed: {0}")]
    ArtifactIntegrity(String),

    /// The shared bundle load failed (reported to every waiter of that load)
    #[error("Failed to load artifact bundle: {0}")]
    BundleLoad(String),

    /// Index build aborted
    #[error("Index build failed: {0}")]
    Build(String),

    /// Embedding errors that escaped row-level isolation
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector index errors
    #[error("Vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),

    /// Query errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// CSV errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VitrineError {
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub fn json(source: serde_json::Error, context: impl Into<String>) -> Self {
        Self::Json {
            source,
            context: context.into(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Vitrine operations
pub type Result<T> = std::result::Result<T, VitrineError>;
