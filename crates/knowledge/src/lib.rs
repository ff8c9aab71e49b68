//! Datasheet question answering.
//!
//! Documents are split into overlapping chunks, embedded, and held in an
//! exact cosine index. Questions are answered by retrieving the nearest
//! chunks and asking an LLM to answer from them, with a rolling
//! conversation memory for follow-ups. [`Session`] ties the pieces together.

pub mod chunker;
pub mod embeddings;
pub mod memory;
pub mod rag;
pub mod session;
pub mod types;
pub mod vector_index;

pub use embeddings::{EmbedKind, Embedder, EmbedderFingerprint, EmbeddingProvider};
pub use memory::{ConversationMemory, Role, Turn};
pub use rag::{AskOutcome, ConversationEngine, SourceRef};
pub use session::{CompletedBuild, EngineState, PreparedBuild, Session};
pub use types::{Chunk, Document, ProcessReport, SkippedDocument};
pub use vector_index::{FlatIndex, IndexStats, VectorIndex, DEFAULT_K};
