//! ElectroGPT Core Library
//!
//! This crate provides the foundational utilities shared by every ElectroGPT crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Timeout and retry policy for remote calls
//! - Logging infrastructure
//! - Configuration management and credential handling

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod secret;

// Re-export commonly used types
pub use config::{AppConfig, Backend, ChunkBoundary};
pub use error::{AppError, AppResult, FailureKind};
pub use retry::RetryPolicy;
pub use secret::Secret;
