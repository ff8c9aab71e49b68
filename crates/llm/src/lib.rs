//! LLM integration crate for ElectroGPT.
//!
//! This crate provides a provider-agnostic abstraction for the generation
//! step of the conversation engine. Providers sit behind the `LlmClient`
//! trait and are wrapped in a timeout/retry decorator by the factory.
//!
//! # Providers
//! - **OpenAI-compatible chat completions**: hosted option (default)
//! - **Ollama**: local runtime
//!
//! # Example
//! ```no_run
//! use electro_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new("http://localhost:11434");
//! let request = LlmRequest::new("What is a pull-up resistor?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod retrying;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, model_name};
pub use providers::{OllamaClient, OpenAiClient};
pub use retrying::RetryingClient;
