//! Embedding engine for datasheet chunks and questions.
//!
//! `Embedder` wraps one provider with batching, bounded concurrency,
//! per-batch timeout/retry and a content-addressed cache.

pub mod cache;
pub mod provider;
pub mod providers;

pub use cache::EmbeddingCache;
pub use provider::{create_provider, EmbedKind, EmbedderFingerprint, EmbeddingProvider};

use cache::{cache_key, CacheKey};
use electro_core::config::EmbeddingBatchConfig;
use electro_core::{AppConfig, AppError, AppResult, FailureKind, RetryPolicy};
use futures::{stream, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;

/// Provider plus batching, retry and cache state for one session.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch: EmbeddingBatchConfig,
    retry: RetryPolicy,
    cache: EmbeddingCache,
}

impl Embedder {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch: EmbeddingBatchConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            batch,
            retry,
            cache: EmbeddingCache::default(),
        }
    }

    /// Build the embedder selected by `config.embedder_backend`.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self::new(
            create_provider(config)?,
            config.embedding.clone(),
            config.retry.clone(),
        ))
    }

    pub fn fingerprint(&self) -> EmbedderFingerprint {
        self.provider.fingerprint()
    }

    /// Number of cached vectors.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Embed chunk texts for indexing, one vector per input in input order.
    pub async fn embed_passages(&mut self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.embed(texts, EmbedKind::Passage).await
    }

    /// Embed a retrieval question.
    pub async fn embed_query(&mut self, question: &str) -> AppResult<Vec<f32>> {
        let mut vectors = self.embed(&[question.to_string()], EmbedKind::Query).await?;
        vectors.pop().ok_or_else(|| {
            AppError::embedding(FailureKind::Permanent, "No embedding returned for question")
        })
    }

    /// Keep only the cached passage vectors for `texts`.
    pub(crate) fn retain_passages(&mut self, texts: &[String]) {
        let keep: HashSet<CacheKey> = texts
            .iter()
            .map(|text| cache_key(EmbedKind::Passage, text))
            .collect();
        self.cache.retain(&keep);
    }

    /// Take over the cache of another embedder over the same vector space.
    pub(crate) fn absorb(&mut self, other: Embedder) {
        if other.fingerprint() == self.fingerprint() {
            self.cache = other.cache;
        }
    }

    async fn embed(&mut self, texts: &[String], kind: EmbedKind) -> AppResult<Vec<Vec<f32>>> {
        let keys: Vec<CacheKey> = texts.iter().map(|text| cache_key(kind, text)).collect();

        // First occurrence of every text not yet cached.
        let mut seen = HashSet::new();
        let pending: Vec<usize> = keys
            .iter()
            .enumerate()
            .filter(|(_, key)| !self.cache.contains(key) && seen.insert(**key))
            .map(|(i, _)| i)
            .collect();

        if !pending.is_empty() {
            let fingerprint = self.fingerprint();
            tracing::debug!(
                embedder = %fingerprint,
                texts = texts.len(),
                uncached = pending.len(),
                "Embedding texts"
            );

            let batch_size = self.batch.batch_size.max(1);
            let concurrency = self.batch.max_concurrent_batches.max(1);
            let provider = &self.provider;
            let retry = &self.retry;

            let batches = contiguous_batches(&pending, batch_size);
            let results: Vec<Vec<Vec<f32>>> = stream::iter(batches.iter().copied())
                .map(|indices| {
                    let batch: Vec<String> = indices.iter().map(|&i| texts[i].clone()).collect();
                    let first = indices[0];
                    let last = indices[indices.len() - 1];
                    async move {
                        embed_batch(provider.as_ref(), retry, &batch, kind)
                            .await
                            .map_err(|e| e.with_chunk_range(first, last + 1))
                    }
                })
                .buffered(concurrency)
                .try_collect()
                .await?;

            for (indices, vectors) in batches.into_iter().zip(results) {
                for (&i, vector) in indices.iter().zip(vectors) {
                    self.cache.insert(keys[i], vector);
                }
            }
        }

        keys.iter()
            .map(|key| {
                self.cache.get(key).cloned().ok_or_else(|| {
                    AppError::embedding(FailureKind::Permanent, "Embedding missing after batch")
                })
            })
            .collect()
    }
}

/// Split `pending` into batches of at most `batch_size` consecutive input
/// indices, so a failed batch names exactly the chunks it carried.
fn contiguous_batches(pending: &[usize], batch_size: usize) -> Vec<&[usize]> {
    let mut batches = Vec::new();
    let mut start = 0;
    for end in 1..=pending.len() {
        let run_ends = end == pending.len() || pending[end] != pending[end - 1] + 1;
        if run_ends || end - start == batch_size {
            batches.push(&pending[start..end]);
            start = end;
        }
    }
    batches
}

/// One batch through the retry policy, validating the response shape.
async fn embed_batch(
    provider: &dyn EmbeddingProvider,
    retry: &RetryPolicy,
    batch: &[String],
    kind: EmbedKind,
) -> AppResult<Vec<Vec<f32>>> {
    let vectors = retry
        .run(
            "embedding batch",
            |message| AppError::embedding(FailureKind::Transient, message),
            || provider.embed_batch(batch, kind),
        )
        .await?;

    if vectors.len() != batch.len() {
        return Err(AppError::embedding(
            FailureKind::Permanent,
            format!("expected {} vectors, received {}", batch.len(), vectors.len()),
        ));
    }

    let dimensions = provider.dimensions();
    if let Some(vector) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(AppError::embedding(
            FailureKind::Permanent,
            format!(
                "expected {}-dimensional vectors, received {}",
                dimensions,
                vector.len()
            ),
        ));
    }

    Ok(vectors)
}
