//! Prompt system for ElectroGPT.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions and a built-in datasheet prompt
//! - Handlebars rendering of the grounded answer prompt
//! - Handlebars rendering of the follow-up condensing prompt

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_condense_prompt, build_prompt};
pub use loader::{default_prompt, load_prompt, resolve_prompt};
pub use types::{
    AnswerInput, BuiltPrompt, BuiltPromptMetadata, CondenseInput, ContextBlock, HistoryEntry,
    PromptDefinition,
};
