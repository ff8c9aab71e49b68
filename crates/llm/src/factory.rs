//! LLM provider factory.
//!
//! Builds the generation client selected by the application configuration,
//! resolves its credential and wraps it in the configured retry policy.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::retrying::RetryingClient;
use electro_core::{AppConfig, AppError, AppResult, Backend};
use std::sync::Arc;

/// Create the LLM client for `config.llm_backend`.
///
/// # Errors
/// Returns `AppError::Config` when the hosted backend is selected and the
/// API key environment variable is unset.
pub fn create_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let inner: Arc<dyn LlmClient> = match config.llm_backend {
        Backend::Hosted => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                AppError::Config(format!(
                    "Hosted generation requires an API key in {}",
                    config.hosted.api_key_env
                ))
            })?;
            Arc::new(OpenAiClient::new(&config.hosted.endpoint, api_key))
        }
        Backend::Local => Arc::new(OllamaClient::new(&config.local.ollama_endpoint)),
    };

    tracing::debug!(
        provider = inner.provider_name(),
        model = model_name(config),
        "Created LLM client"
    );

    Ok(Arc::new(RetryingClient::new(inner, config.retry.clone())))
}

/// Model identifier sent with each request for the configured backend.
pub fn model_name(config: &AppConfig) -> &str {
    match config.llm_backend {
        Backend::Hosted => &config.hosted.chat_model,
        Backend::Local => &config.local.ollama_model,
    }
}
