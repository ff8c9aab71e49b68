//! Session state: the index, engine state and conversation memory of one user.
//!
//! A build runs in two halves so callers may run several concurrently:
//! `prepare_build` takes a generation ticket and snapshots what the build
//! needs, `PreparedBuild::run` does the work without touching the session,
//! and `install` swaps the result in only if no newer build was prepared in
//! the meantime. `process` chains the three for the common case.

use crate::chunker;
use crate::embeddings::Embedder;
use crate::memory::ConversationMemory;
use crate::rag::{AskOutcome, ConversationEngine};
use crate::types::{Chunk, Document, ProcessReport, SkippedDocument};
use crate::vector_index::{FlatIndex, IndexStats, VectorIndex};
use electro_core::config::ChunkingConfig;
use electro_core::{AppConfig, AppError, AppResult};
use serde::Serialize;
use uuid::Uuid;

/// Share of non-whitespace characters that may be replacement or control
/// characters before a document is treated as corrupt.
const MAX_GARBAGE_RATIO: f64 = 0.5;

/// Whether questions can be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No index yet
    Idle,
    /// An index is installed
    Ready,
}

/// A build that has been assigned a ticket but not run.
#[derive(Debug)]
pub struct PreparedBuild {
    ticket: u64,
    chunking: ChunkingConfig,
    embedder: Embedder,
}

/// A finished build waiting to be installed.
#[derive(Debug)]
pub struct CompletedBuild {
    ticket: u64,
    index: FlatIndex,
    report: ProcessReport,
    embedder: Embedder,
}

impl CompletedBuild {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn report(&self) -> &ProcessReport {
        &self.report
    }
}

impl PreparedBuild {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Chunk, embed and index `documents`.
    ///
    /// Empty or corrupt documents are skipped and reported. Fails with
    /// `Ingestion` when nothing usable remains, and with the embedder's
    /// error when any batch fails; no partial index is produced.
    pub async fn run(mut self, documents: Vec<Document>) -> AppResult<CompletedBuild> {
        let mut skipped = Vec::new();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut used = 0;

        for document in &documents {
            if let Some(reason) = unusable_reason(&document.text) {
                tracing::warn!(document = %document.id, reason, "Skipping document");
                skipped.push(SkippedDocument {
                    document_id: document.id.clone(),
                    reason: reason.to_string(),
                });
                continue;
            }

            let document_chunks = chunker::split(&document.id, &document.text, &self.chunking);
            tracing::debug!(document = %document.id, chunks = document_chunks.len(), "Chunked document");
            chunks.extend(document_chunks);
            used += 1;
        }

        if chunks.is_empty() {
            return Err(AppError::Ingestion(if documents.is_empty() {
                "No documents were provided".to_string()
            } else {
                format!("All {} documents were skipped", documents.len())
            }));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_passages(&texts).await?;
        self.embedder.retain_passages(&texts);

        let fingerprint = self.embedder.fingerprint();
        let chunk_count = chunks.len();
        let index = FlatIndex::build(fingerprint.clone(), vectors.into_iter().zip(chunks).collect())?;

        tracing::info!(
            ticket = self.ticket,
            documents = used,
            chunks = chunk_count,
            skipped = skipped.len(),
            embedder = %fingerprint,
            "Build finished"
        );

        Ok(CompletedBuild {
            ticket: self.ticket,
            index,
            report: ProcessReport {
                ticket: self.ticket,
                documents: used,
                chunks: chunk_count,
                skipped,
                fingerprint,
            },
            embedder: self.embedder,
        })
    }
}

/// Why a document cannot be indexed, if it cannot.
fn unusable_reason(text: &str) -> Option<&'static str> {
    let mut visible = 0usize;
    let mut garbage = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if c == char::REPLACEMENT_CHARACTER || c.is_control() {
            garbage += 1;
        }
    }

    if visible == 0 {
        Some("document contains no extractable text")
    } else if garbage as f64 / visible as f64 > MAX_GARBAGE_RATIO {
        Some("document text is corrupt")
    } else {
        None
    }
}

/// Per-user conversation context.
pub struct Session {
    id: Uuid,
    chunking: ChunkingConfig,
    embedder: Embedder,
    engine: ConversationEngine,
    index: Option<FlatIndex>,
    memory: ConversationMemory,
    generation: u64,
}

impl Session {
    /// Create a session from configuration, constructing the configured
    /// embedder, LLM client and prompt.
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        let embedder = Embedder::from_config(config)?;
        let engine = ConversationEngine::from_config(config)?;
        Ok(Self::with_parts(config.chunking.clone(), embedder, engine))
    }

    /// Create a session from already-built parts.
    pub fn with_parts(chunking: ChunkingConfig, embedder: Embedder, engine: ConversationEngine) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, embedder = %embedder.fingerprint(), "Session created");

        Self {
            id,
            chunking,
            embedder,
            engine,
            index: None,
            memory: ConversationMemory::new(),
            generation: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> EngineState {
        match self.index {
            Some(_) => EngineState::Ready,
            None => EngineState::Idle,
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Statistics of the installed index.
    pub fn stats(&self) -> Option<IndexStats> {
        self.index.as_ref().map(|index| index.stats())
    }

    /// Replace the active embedder. An installed index built with a
    /// different embedder rejects questions until documents are processed
    /// again.
    pub fn set_embedder(&mut self, embedder: Embedder) {
        tracing::info!(session = %self.id, embedder = %embedder.fingerprint(), "Embedder replaced");
        self.embedder = embedder;
    }

    /// Build an index from `documents` and install it.
    ///
    /// On failure the previous index and memory are kept.
    pub async fn process(&mut self, documents: Vec<Document>) -> AppResult<ProcessReport> {
        let build = self.prepare_build();
        let completed = build.run(documents).await?;
        self.install(completed)
    }

    /// Take a new generation ticket, superseding every earlier build.
    pub fn prepare_build(&mut self) -> PreparedBuild {
        self.generation += 1;
        tracing::debug!(session = %self.id, ticket = self.generation, "Build prepared");

        PreparedBuild {
            ticket: self.generation,
            chunking: self.chunking.clone(),
            embedder: self.embedder.clone(),
        }
    }

    /// Install a finished build, replacing the index and clearing memory.
    ///
    /// Fails with `BuildSuperseded` if a newer build has been prepared; the
    /// build is discarded and the session is unchanged.
    pub fn install(&mut self, build: CompletedBuild) -> AppResult<ProcessReport> {
        if build.ticket != self.generation {
            tracing::info!(
                session = %self.id,
                ticket = build.ticket,
                current = self.generation,
                "Discarding superseded build"
            );
            return Err(AppError::BuildSuperseded {
                ticket: build.ticket,
                current: self.generation,
            });
        }

        self.embedder.absorb(build.embedder);
        self.index = Some(build.index);
        self.memory.clear();

        Ok(build.report)
    }

    /// Answer a question against the installed index.
    ///
    /// Memory is updated only when an answer is produced.
    pub async fn ask(&mut self, question: &str) -> AppResult<AskOutcome> {
        let index = self.index.as_ref().ok_or(AppError::IndexNotReady)?;

        let outcome = self
            .engine
            .answer(index, &mut self.embedder, question, &self.memory)
            .await?;

        self.memory = outcome.memory.clone();
        Ok(outcome)
    }

    /// Forget the conversation, keeping the index.
    pub fn reset_conversation(&mut self) {
        self.memory.clear();
    }
}
