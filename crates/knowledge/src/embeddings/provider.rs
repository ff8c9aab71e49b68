//! Embedding provider trait and factory.

use super::providers::{LocalEmbeddingProvider, OpenAiEmbeddingProvider};
use electro_core::{AppConfig, AppError, AppResult, Backend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether a text is stored in the index or used to search it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedKind {
    Passage,
    Query,
}

impl EmbedKind {
    /// Instruction prefix used by instruction-tuned embedders.
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Passage => "Represent the datasheet passage for retrieval:",
            Self::Query => "Represent the question for retrieving supporting datasheet passages:",
        }
    }
}

/// Identifies the vector space produced by an embedder.
///
/// Vectors are only comparable when their fingerprints are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedderFingerprint {
    pub backend: Backend,
    pub model: String,
    pub dimensions: usize,
}

impl fmt::Display for EmbedderFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}d)", self.backend, self.model, self.dimensions)
    }
}

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Which backend this provider implements
    fn backend(&self) -> Backend;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch, one per input.
    async fn embed_batch(&self, texts: &[String], kind: EmbedKind) -> AppResult<Vec<Vec<f32>>>;

    fn fingerprint(&self) -> EmbedderFingerprint {
        EmbedderFingerprint {
            backend: self.backend(),
            model: self.model_name().to_string(),
            dimensions: self.dimensions(),
        }
    }
}

/// Create the embedding provider selected by `config.embedder_backend`.
///
/// # Errors
/// - `AppError::Config` when the hosted backend has no API key
/// - `AppError::ModelLoad` when the local model's weight file cannot be used
pub fn create_provider(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.embedder_backend {
        Backend::Hosted => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                AppError::Config(format!(
                    "Hosted embeddings require an API key in {}",
                    config.hosted.api_key_env
                ))
            })?;
            Ok(Arc::new(OpenAiEmbeddingProvider::new(
                &config.hosted.endpoint,
                api_key,
                &config.hosted.embedding_model,
                config.hosted.embedding_dimensions,
            )))
        }
        Backend::Local => Ok(Arc::new(LocalEmbeddingProvider::load(&config.local)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_local_provider() {
        let config = AppConfig {
            embedder_backend: Backend::Local,
            ..AppConfig::default()
        };

        let provider = create_provider(&config).unwrap();
        let fingerprint = provider.fingerprint();
        assert_eq!(fingerprint.backend, Backend::Local);
        assert_eq!(fingerprint.dimensions, 384);
        assert_eq!(fingerprint.to_string(), "local/trigram-v1 (384d)");
    }

    #[test]
    fn test_hosted_provider_requires_key() {
        let mut config = AppConfig::default();
        config.embedder_backend = Backend::Hosted;
        config.hosted.api_key_env = "ELECTROGPT_TEST_EMBED_KEY_NEVER_SET".to_string();

        let err = create_provider(&config).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_instructions_differ_by_kind() {
        assert_ne!(EmbedKind::Passage.instruction(), EmbedKind::Query.instruction());
    }
}
