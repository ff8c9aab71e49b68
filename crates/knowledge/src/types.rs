//! Knowledge system type definitions.

use crate::embeddings::EmbedderFingerprint;
use serde::{Deserialize, Serialize};

/// A source document: identifier plus extracted plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Identifier shown in source references (usually the file name)
    pub id: String,

    /// Raw extracted text
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A contiguous slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document identifier
    pub document_id: String,

    /// 0-based ordinal within the document
    pub position: usize,

    /// Byte offset of the chunk's first character in the document text
    pub start: usize,

    /// Chunk text, an exact substring of the document
    pub text: String,
}

impl Chunk {
    /// Byte offset one past the chunk's last character.
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// A document left out of a build, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub document_id: String,
    pub reason: String,
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    /// Generation ticket of the build
    pub ticket: u64,

    /// Documents that contributed chunks
    pub documents: usize,

    /// Chunks indexed
    pub chunks: usize,

    /// Documents that were skipped
    pub skipped: Vec<SkippedDocument>,

    /// Embedder the index was built with
    pub fingerprint: EmbedderFingerprint,
}
