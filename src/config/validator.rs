use crate::config::Config;
use crate::error::{Result, ValidationError, VitrineError};
use crate::evaluation::CUTOFF;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_artifacts(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_evaluation(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VitrineError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_artifacts(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.artifacts.dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "artifacts.dir",
                "Artifact directory cannot be empty",
            ));
        }

        if config.artifacts.catalog_file.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "artifacts.catalog_file",
                "Catalog file path cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.text_model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.text_model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.cross_modal_model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.cross_modal_model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.default_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_k",
                "Result count must be at least 1",
            ));
        }

        for (path, weight) in [
            ("retrieval.text_weight", retrieval.text_weight),
            ("retrieval.image_weight", retrieval.image_weight),
            ("retrieval.keyword_weight", retrieval.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                errors.push(ValidationError::new(
                    path,
                    format!("Weight must be a non-negative number, got {}", weight),
                ));
            }
        }

        if !(0.0..=1.0).contains(&retrieval.rerank_blend) {
            errors.push(ValidationError::new(
                "retrieval.rerank_blend",
                format!(
                    "Blend factor must be between 0.0 and 1.0, got {}",
                    retrieval.rerank_blend
                ),
            ));
        }

        if retrieval.enable_reranking {
            if retrieval.rerank_prefix == 0 {
                errors.push(ValidationError::new(
                    "retrieval.rerank_prefix",
                    "Rerank prefix must be greater than 0 when reranking is enabled",
                ));
            }
            if retrieval.reranker_model.is_empty() {
                errors.push(ValidationError::new(
                    "retrieval.reranker_model",
                    "Reranker model cannot be empty when reranking is enabled",
                ));
            }
        }
    }

    fn validate_evaluation(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.evaluation.k < CUTOFF {
            errors.push(ValidationError::new(
                "evaluation.k",
                format!("Evaluation depth must be at least {}", CUTOFF),
            ));
        }
    }
}
