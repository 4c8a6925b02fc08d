//! Configuration management for Vitrine
//!
//! Loads the TOML configuration, applies profile and environment overrides and
//! validates the result before anything downstream sees it.

use crate::error::{Result, VitrineError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub artifacts: ArtifactsConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where the catalog comes from and where the bundle lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Bundle directory
    pub dir: PathBuf,
    /// Product catalog CSV consumed by `build`
    pub catalog_file: PathBuf,
    /// Root that catalog image paths are resolved against
    pub image_root: PathBuf,
}

/// Embedding model selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub text_model: String,
    pub cross_modal_model: String,
    pub batch_size: usize,
}

/// Query-time fusion and reranking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub default_k: usize,
    pub text_weight: f32,
    pub image_weight: f32,
    pub keyword_weight: f32,
    pub enable_reranking: bool,
    pub reranker_model: String,
    /// Number of fused candidates sent to the reranker
    pub rerank_prefix: usize,
    /// Share of the fused score kept when blending in the reranker score
    pub rerank_blend: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 20,
            text_weight: 0.5,
            image_weight: 0.3,
            keyword_weight: 0.2,
            enable_reranking: true,
            reranker_model: "BAAI/bge-reranker-base".to_string(),
            rerank_prefix: 40,
            rerank_blend: 0.8,
        }
    }
}

/// Offline evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub queries_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels_file: Option<PathBuf>,
    pub k: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_reranking: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VitrineError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| VitrineError::io(e, format!("Failed to read config file: {:?}", path)))?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| VitrineError::io(e, format!("Failed to write config file: {:?}", path)))?;
        Ok(())
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| VitrineError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(w) = overrides.text_weight {
            self.retrieval.text_weight = w;
        }
        if let Some(w) = overrides.image_weight {
            self.retrieval.image_weight = w;
        }
        if let Some(w) = overrides.keyword_weight {
            self.retrieval.keyword_weight = w;
        }
        if let Some(enabled) = overrides.enable_reranking {
            self.retrieval.enable_reranking = enabled;
        }

        ConfigValidator::validate(self)
    }

    /// Apply environment variable overrides
    /// Environment variables in format: VITRINE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("VITRINE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "ARTIFACTS__DIR" => self.artifacts.dir = PathBuf::from(value),
            "ARTIFACTS__CATALOG_FILE" => self.artifacts.catalog_file = PathBuf::from(value),
            "ARTIFACTS__IMAGE_ROOT" => self.artifacts.image_root = PathBuf::from(value),
            "RETRIEVAL__ENABLE_RERANKING" => {
                self.retrieval.enable_reranking = parse_value(path, value)?;
            }
            "RETRIEVAL__TEXT_WEIGHT" => self.retrieval.text_weight = parse_value(path, value)?,
            "RETRIEVAL__IMAGE_WEIGHT" => self.retrieval.image_weight = parse_value(path, value)?,
            "RETRIEVAL__KEYWORD_WEIGHT" => {
                self.retrieval.keyword_weight = parse_value(path, value)?;
            }
            "EMBEDDING__TEXT_MODEL" => self.embedding.text_model = value.to_string(),
            "EMBEDDING__CROSS_MODAL_MODEL" => {
                self.embedding.cross_modal_model = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| VitrineError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("vitrine").join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| VitrineError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            artifacts: ArtifactsConfig {
                dir: PathBuf::from("artifacts"),
                catalog_file: PathBuf::from("data/products.csv"),
                image_root: PathBuf::from("public"),
            },
            embedding: EmbeddingConfig {
                text_model: "all-MiniLM-L6-v2".to_string(),
                cross_modal_model: "clip-ViT-B-32".to_string(),
                batch_size: 32,
            },
            retrieval: RetrievalConfig::default(),
            evaluation: EvaluationConfig {
                queries_file: PathBuf::from("eval/queries.txt"),
                labels_file: None,
                k: 10,
            },
            profiles: HashMap::new(),
        }
    }
}
