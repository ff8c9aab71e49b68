//! Content-addressed embedding cache.

use super::EmbedKind;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// SHA-256 of instruction and text.
pub type CacheKey = [u8; 32];

/// Key for `text` embedded as `kind`.
pub fn cache_key(kind: EmbedKind, text: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(kind.instruction().as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

/// Vectors already produced by one embedder, keyed by content.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCache {
    entries: HashMap<CacheKey, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn get(&self, key: &CacheKey) -> Option<&Vec<f32>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: CacheKey, vector: Vec<f32>) {
        self.entries.insert(key, vector);
    }

    /// Drop every entry whose key is not in `keep`.
    pub fn retain(&mut self, keep: &HashSet<CacheKey>) {
        self.entries.retain(|key, _| keep.contains(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
