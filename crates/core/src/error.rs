//! Error types for ElectroGPT.
//!
//! A single error enum covers every failure category of the pipeline:
//! ingestion, embedding, indexing, conversation and the ambient concerns
//! (configuration, I/O, serialization).

use std::fmt;
use thiserror::Error;

/// Whether a failed remote call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, rate limits, connection resets, 5xx responses.
    Transient,
    /// Authentication failures and invalid requests.
    Permanent,
}

impl FailureKind {
    /// Classify an HTTP status code returned by a remote service.
    ///
    /// Timeouts, rate limits and server errors are transient; any other
    /// non-success status is permanent.
    pub fn from_status(status: u16) -> Self {
        match status {
            408 | 429 | 500..=599 => Self::Transient,
            _ => Self::Permanent,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// Unified error type for ElectroGPT.
///
/// All library functions return `Result<T, AppError>`.
/// Errors are represented and propagated, never turned into panics.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be used (empty or corrupt text)
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// The hosted embedding service failed
    #[error("Embedding service error ({kind}){}: {message}", range_suffix(.chunks))]
    EmbeddingService {
        kind: FailureKind,
        /// Half-open range of chunk indices covered by the failing batch
        chunks: Option<(usize, usize)>,
        message: String,
    },

    /// The local embedding model could not be loaded
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// A question was asked before any document set was processed
    #[error("No index is ready; process documents before asking questions")]
    IndexNotReady,

    /// The active embedder differs from the one the index was built with
    #[error("Embedder mismatch: index was built with {indexed}, active embedder is {active}")]
    EmbedderMismatch { indexed: String, active: String },

    /// The language model call failed
    #[error("LLM invocation error ({kind}): {message}")]
    LlmInvocation { kind: FailureKind, message: String },

    /// A build finished after a newer build had been started
    #[error("Build {ticket} was superseded by build {current}")]
    BuildSuperseded { ticket: u64, current: u64 },

    /// Caller supplied unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn range_suffix(chunks: &Option<(usize, usize)>) -> String {
    match chunks {
        Some((start, end)) => format!(" for chunks {}..{}", start, end),
        None => String::new(),
    }
}

impl AppError {
    /// Shorthand for a transient LLM failure.
    pub fn llm_transient(message: impl Into<String>) -> Self {
        Self::LlmInvocation {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    /// Shorthand for a permanent LLM failure.
    pub fn llm_permanent(message: impl Into<String>) -> Self {
        Self::LlmInvocation {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    /// Shorthand for an embedding service failure not yet tied to a batch.
    pub fn embedding(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::EmbeddingService {
            kind,
            chunks: None,
            message: message.into(),
        }
    }

    /// Attach the chunk range of the failing batch to an embedding error.
    ///
    /// Other variants are returned unchanged.
    pub fn with_chunk_range(self, start: usize, end: usize) -> Self {
        match self {
            Self::EmbeddingService { kind, message, .. } => Self::EmbeddingService {
                kind,
                chunks: Some((start, end)),
                message,
            },
            other => other,
        }
    }

    /// Whether retrying the failed operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LlmInvocation {
                kind: FailureKind::Transient,
                ..
            } | Self::EmbeddingService {
                kind: FailureKind::Transient,
                ..
            }
        )
    }

    /// Human-readable message safe to show to an end user.
    ///
    /// Never includes upstream response bodies or other internal detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) => {
                "The application is misconfigured. Check your settings and credentials.".to_string()
            }
            Self::Io(_) => "A file could not be read or written.".to_string(),
            Self::Ingestion(_) => {
                "None of the uploaded documents contained readable text.".to_string()
            }
            Self::EmbeddingService { chunks, .. } => match chunks {
                Some((start, end)) => format!(
                    "The embedding service is unavailable (failed on chunks {}-{}). Please try processing again.",
                    start,
                    end.saturating_sub(1)
                ),
                None => "The embedding service is unavailable. Please try processing again."
                    .to_string(),
            },
            Self::ModelLoad(_) => {
                "The local embedding model could not be loaded. Check the model path.".to_string()
            }
            Self::IndexNotReady => {
                "Please upload and process your datasheets before asking a question.".to_string()
            }
            Self::EmbedderMismatch { .. } => {
                "The embedding settings changed since the documents were processed. Please process them again."
                    .to_string()
            }
            Self::LlmInvocation {
                kind: FailureKind::Transient,
                ..
            } => "The language model is busy or unreachable. Please try again shortly.".to_string(),
            Self::LlmInvocation {
                kind: FailureKind::Permanent,
                ..
            } => "The language model rejected the request. Check your credentials and model settings."
                .to_string(),
            Self::BuildSuperseded { .. } => {
                "A newer processing request replaced this one.".to_string()
            }
            Self::InvalidInput(message) => message.clone(),
            Self::Prompt(_) => "The prompt template could not be rendered.".to_string(),
            Self::Serialization(_) => "A configuration or data file is malformed.".to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
