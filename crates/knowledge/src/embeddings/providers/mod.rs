//! Embedding provider implementations.

mod local;
mod openai;

pub use local::LocalEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;
