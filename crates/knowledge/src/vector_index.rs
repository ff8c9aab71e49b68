//! Vector index over embedded chunks.
//!
//! `FlatIndex` performs exact cosine search. It is built once from a
//! complete set of (vector, chunk) entries and never modified; a new
//! document set produces a new index.

use crate::embeddings::EmbedderFingerprint;
use crate::types::Chunk;
use chrono::{DateTime, Utc};
use electro_core::{AppError, AppResult, FailureKind};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Default number of results per query.
pub const DEFAULT_K: usize = 4;

/// Trait for vector index backends.
pub trait VectorIndex: Send + Sync {
    /// Top-`k` chunks by descending similarity to `query`.
    fn query(&self, query: &[f32], k: usize) -> AppResult<Vec<(Chunk, f32)>>;

    /// Embedder whose vectors the index holds.
    fn fingerprint(&self) -> &EmbedderFingerprint;

    fn stats(&self) -> IndexStats;
}

/// Statistics about a built index.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexStats {
    pub chunks: usize,
    pub documents: usize,
    pub dimensions: usize,
    pub fingerprint: EmbedderFingerprint,
    pub built_at: DateTime<Utc>,
}

/// Exact in-memory cosine index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    fingerprint: EmbedderFingerprint,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
    documents: usize,
    built_at: DateTime<Utc>,
}

impl FlatIndex {
    /// Build an index from entries produced by the embedder `fingerprint`.
    ///
    /// Vectors are normalised here. Any vector whose length differs from
    /// the fingerprint's dimensions rejects the whole build.
    pub fn build(
        fingerprint: EmbedderFingerprint,
        entries: Vec<(Vec<f32>, Chunk)>,
    ) -> AppResult<Self> {
        let mut vectors = Vec::with_capacity(entries.len());
        let mut chunks = Vec::with_capacity(entries.len());

        for (i, (vector, chunk)) in entries.into_iter().enumerate() {
            if vector.len() != fingerprint.dimensions {
                return Err(AppError::EmbeddingService {
                    kind: FailureKind::Permanent,
                    chunks: Some((i, i + 1)),
                    message: format!(
                        "vector has {} dimensions, {} expects {}",
                        vector.len(),
                        fingerprint,
                        fingerprint.dimensions
                    ),
                });
            }
            vectors.push(normalize(vector));
            chunks.push(chunk);
        }

        let documents = chunks
            .iter()
            .map(|c| c.document_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        tracing::debug!(
            chunks = chunks.len(),
            documents,
            embedder = %fingerprint,
            "Built vector index"
        );

        Ok(Self {
            fingerprint,
            vectors,
            chunks,
            documents,
            built_at: Utc::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl VectorIndex for FlatIndex {
    fn query(&self, query: &[f32], k: usize) -> AppResult<Vec<(Chunk, f32)>> {
        if query.len() != self.fingerprint.dimensions {
            return Err(AppError::EmbedderMismatch {
                indexed: self.fingerprint.to_string(),
                active: format!("a {}-dimensional query vector", query.len()),
            });
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let query = normalize(query.to_vec());
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(v, &query)))
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| (self.chunks[i].clone(), score))
            .collect())
    }

    fn fingerprint(&self) -> &EmbedderFingerprint {
        &self.fingerprint
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            chunks: self.chunks.len(),
            documents: self.documents,
            dimensions: self.fingerprint.dimensions,
            fingerprint: self.fingerprint.clone(),
            built_at: self.built_at,
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale to unit length; zero vectors stay zero.
fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = dot(&v, &v).sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use electro_core::Backend;

    fn fingerprint(dimensions: usize) -> EmbedderFingerprint {
        EmbedderFingerprint {
            backend: Backend::Local,
            model: "test".to_string(),
            dimensions,
        }
    }

    fn chunk(document_id: &str, position: usize, text: &str) -> Chunk {
        Chunk {
            document_id: document_id.to_string(),
            position,
            start: 0,
            text: text.to_string(),
        }
    }

    fn sample_index() -> FlatIndex {
        FlatIndex::build(
            fingerprint(3),
            vec![
                (vec![1.0, 0.0, 0.0], chunk("a.pdf", 0, "regulator")),
                (vec![0.0, 2.0, 0.0], chunk("a.pdf", 1, "resistor")),
                (vec![0.7, 0.7, 0.0], chunk("b.pdf", 0, "both")),
                (vec![0.0, 0.0, 0.0], chunk("b.pdf", 1, "empty")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_first() {
        let index = sample_index();
        let results = index.query(&[0.0, 5.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.text, "resistor");
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results[1].0.text, "both");
    }

    #[test]
    fn test_k_larger_than_index_returns_all() {
        let index = sample_index();
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 10).unwrap().len(), 4);
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let index = sample_index();
        assert!(index.query(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let index = sample_index();
        let results = index.query(&[1.0, 0.0, 0.0], 4).unwrap();
        let empty = results.iter().find(|(c, _)| c.text == "empty").unwrap();
        assert_eq!(empty.1, 0.0);

        let zero_query = index.query(&[0.0, 0.0, 0.0], 4).unwrap();
        assert!(zero_query.iter().all(|(_, score)| *score == 0.0));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = FlatIndex::build(
            fingerprint(2),
            vec![
                (vec![1.0, 0.0], chunk("d", 0, "first")),
                (vec![0.0, 1.0], chunk("d", 1, "other")),
                (vec![2.0, 0.0], chunk("d", 2, "second")),
                (vec![3.0, 0.0], chunk("d", 3, "third")),
            ],
        )
        .unwrap();

        let texts: Vec<String> = index
            .query(&[1.0, 0.0], 3)
            .unwrap()
            .into_iter()
            .map(|(c, _)| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = sample_index();
        let err = index.query(&[1.0, 0.0], 4).unwrap_err();
        assert!(matches!(err, AppError::EmbedderMismatch { .. }));
    }

    #[test]
    fn test_build_rejects_wrong_dimensions() {
        let err = FlatIndex::build(
            fingerprint(3),
            vec![
                (vec![1.0, 0.0, 0.0], chunk("a", 0, "ok")),
                (vec![1.0, 0.0], chunk("a", 1, "short")),
            ],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            AppError::EmbeddingService {
                chunks: Some((1, 2)),
                ..
            }
        ));
    }

    #[test]
    fn test_stats() {
        let stats = sample_index().stats();
        assert_eq!(stats.chunks, 4);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.dimensions, 3);
        assert_eq!(stats.fingerprint, fingerprint(3));
    }

    #[test]
    fn test_results_only_contain_indexed_chunks() {
        let index = sample_index();
        let indexed = ["regulator", "resistor", "both", "empty"];
        for (chunk, _) in index.query(&[0.3, 0.2, 0.9], 3).unwrap() {
            assert!(indexed.contains(&chunk.text.as_str()));
        }
    }
}
