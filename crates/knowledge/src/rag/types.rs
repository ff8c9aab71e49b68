//! RAG response types.

use crate::memory::ConversationMemory;
use crate::types::Chunk;
use serde::Serialize;

/// Maximum snippet length for source references, in characters.
pub const MAX_SNIPPET_LENGTH: usize = 150;

/// A retrieved chunk that was given to the model as evidence.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceRef {
    /// Source document identifier (e.g., "lm7805.pdf")
    pub document: String,

    /// Chunk ordinal within the document
    pub position: usize,

    /// Cosine similarity to the retrieval question
    pub score: f32,

    /// Short snippet of the chunk (truncated if needed)
    pub snippet: String,
}

impl SourceRef {
    pub fn from_hit(chunk: &Chunk, score: f32) -> Self {
        Self {
            document: chunk.document_id.clone(),
            position: chunk.position,
            score,
            snippet: truncate_snippet(chunk.text.trim(), MAX_SNIPPET_LENGTH),
        }
    }
}

/// Result of asking a question.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    /// Natural language answer synthesised by the LLM
    pub answer: String,

    /// Chunks used as evidence, nearest first
    pub sources: Vec<SourceRef>,

    /// Question used for retrieval (the condensed form for follow-ups)
    pub retrieval_question: String,

    /// Conversation memory including this exchange
    pub memory: ConversationMemory,
}

/// Truncate to at most `max_chars` characters, preferring a word break.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let truncated = &text[..cut];
            match truncated.rfind(char::is_whitespace) {
                Some(last_space) => format!("{}...", truncated[..last_space].trim_end()),
                None => format!("{}...", truncated),
            }
        }
    }
}
