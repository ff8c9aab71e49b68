//! Prompt types for ElectroGPT.
//!
//! This module defines the prompt definitions and the render inputs handed
//! to the templates.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// System instructions sent with every grounded answer
    pub system: String,

    /// Handlebars template for the grounded answer prompt
    pub template: String,

    /// Handlebars template that rewrites a follow-up into a standalone question
    #[serde(rename = "condenseTemplate")]
    pub condense_template: String,
}

/// One retrieved chunk as presented to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ContextBlock {
    /// Position label, e.g. "Document 1"
    pub label: String,

    /// Source document identifier
    pub document: String,

    pub text: String,
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// "User" or "Assistant"
    pub speaker: String,

    pub content: String,
}

/// Variables for the grounded answer template.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AnswerInput {
    pub question: String,
    pub context: Vec<ContextBlock>,
    pub history: Vec<HistoryEntry>,
}

/// Variables for the question-condensing template.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CondenseInput {
    pub question: String,
    pub history: Vec<HistoryEntry>,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Number of retrieved chunks included
    #[serde(rename = "contextBlocks")]
    pub context_blocks: usize,

    /// Number of prior turns included
    #[serde(rename = "historyTurns")]
    pub history_turns: usize,
}
