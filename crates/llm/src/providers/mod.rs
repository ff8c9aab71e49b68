//! LLM provider implementations.

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use electro_core::{AppError, FailureKind};

/// Map a transport-level reqwest failure to an LLM invocation error.
///
/// Timeouts and connection failures are transient; anything else (a
/// malformed URL, a redirect loop) will not improve on retry.
pub(crate) fn request_error(provider: &str, err: reqwest::Error) -> AppError {
    let kind = if err.is_timeout() || err.is_connect() {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    };

    AppError::LlmInvocation {
        kind,
        message: format!("Failed to send request to {}: {}", provider, err),
    }
}
