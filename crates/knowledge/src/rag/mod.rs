//! RAG (Retrieval-Augmented Generation) answering.
//!
//! Retrieves datasheet chunks for a question and synthesises an answer with
//! an LLM, carrying conversation memory between questions.

pub mod engine;
pub mod types;

pub use engine::ConversationEngine;
pub use types::{AskOutcome, SourceRef};
