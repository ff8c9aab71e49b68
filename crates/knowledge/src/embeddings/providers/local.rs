//! In-process embedding model.
//!
//! Hashes character trigrams and whole words into a fixed number of
//! dimensions and normalises the result to a unit vector. Inputs are read
//! together with an instruction prefix that differs for passages and
//! questions; the prefix contributes at a low weight so it tilts the vector
//! without swamping the content. An optional term-weight file boosts or
//! damps individual terms (part numbers, units, domain vocabulary).

use crate::embeddings::{EmbedKind, EmbeddingProvider};
use electro_core::config::LocalConfig;
use electro_core::{AppError, AppResult, Backend};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

const BASE_MODEL: &str = "trigram-v1";

/// Relative weight of instruction tokens compared to content tokens.
const INSTRUCTION_WEIGHT: f32 = 0.1;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "does", "do",
];

/// Hashed trigram/word embedding model running in-process.
#[derive(Debug)]
pub struct LocalEmbeddingProvider {
    dimensions: usize,
    model: String,
    term_weights: HashMap<String, f32>,
    stop_words: HashSet<&'static str>,
}

impl LocalEmbeddingProvider {
    /// Create the built-in model with `dimensions` outputs.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model: BASE_MODEL.to_string(),
            term_weights: HashMap::new(),
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Build the model described by `config`, loading term weights if a
    /// model path is configured.
    pub fn load(config: &LocalConfig) -> AppResult<Self> {
        if config.embedding_dimensions == 0 {
            return Err(AppError::ModelLoad(
                "Local embedding dimensions must be positive".to_string(),
            ));
        }

        let mut provider = Self::new(config.embedding_dimensions);
        if let Some(path) = &config.embedding_model_path {
            provider.term_weights = load_term_weights(path)?;
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "weights".to_string());
            provider.model = format!("{}+{}", BASE_MODEL, stem);

            tracing::info!(
                model = %provider.model,
                terms = provider.term_weights.len(),
                "Loaded local embedding term weights"
            );
        }

        Ok(provider)
    }

    fn embed_text(&self, text: &str, kind: EmbedKind) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];

        self.accumulate(&mut embedding, kind.instruction(), INSTRUCTION_WEIGHT);
        let content_features = self.accumulate(&mut embedding, text, 1.0);

        // Text with no usable terms maps to the zero vector so it never
        // matches on the instruction alone.
        if content_features == 0 {
            return vec![0.0; self.dimensions];
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }

    /// Add the features of `text` scaled by `scale`; returns the number of
    /// terms that contributed.
    fn accumulate(&self, embedding: &mut [f32], text: &str, scale: f32) -> usize {
        let lower = text.to_lowercase();

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower.unicode_words() {
            if self.keeps(word) {
                *word_freq.entry(word).or_insert(0) += 1;
            }
        }

        // Iterate in a fixed order so float accumulation is reproducible.
        let mut words: Vec<(&str, u32)> = word_freq.into_iter().collect();
        words.sort_unstable();

        for (word, freq) in &words {
            let weight = scale * self.term_weights.get(*word).copied().unwrap_or(1.0);

            let chars: Vec<char> = word.chars().collect();
            for trigram in chars.windows(3) {
                let dim = bucket(trigram.iter().collect::<String>().as_bytes(), 37, self.dimensions);
                embedding[dim] += weight * (*freq as f32).sqrt();
            }

            let dim = bucket(word.as_bytes(), 31, self.dimensions);
            embedding[dim] += weight * *freq as f32;
        }

        words.len()
    }

    /// Short tokens are kept only when they carry a digit ("5", "3v").
    fn keeps(&self, word: &str) -> bool {
        if self.stop_words.contains(word) {
            return false;
        }
        word.chars().count() > 2 || word.chars().any(|c| c.is_ascii_digit())
    }
}

fn bucket(bytes: &[u8], multiplier: u64, dimensions: usize) -> usize {
    let hash = bytes
        .iter()
        .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(*b as u64));
    (hash % dimensions as u64) as usize
}

/// Read a YAML or JSON map of `term -> weight`.
fn load_term_weights(path: &Path) -> AppResult<HashMap<String, f32>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::ModelLoad(format!("Failed to read term weights {:?}: {}", path, e))
    })?;

    let raw: HashMap<String, f32> = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::ModelLoad(format!("Failed to parse term weights {:?}: {}", path, e))
    })?;

    if let Some((term, weight)) = raw.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        return Err(AppError::ModelLoad(format!(
            "Invalid weight {} for term {:?} in {:?}",
            weight, term, path
        )));
    }

    Ok(raw
        .into_iter()
        .map(|(term, weight)| (term.to_lowercase(), weight))
        .collect())
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String], kind: EmbedKind) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text, kind)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    async fn embed_one(provider: &LocalEmbeddingProvider, text: &str, kind: EmbedKind) -> Vec<f32> {
        provider
            .embed_batch(&[text.to_string()], kind)
            .await
            .unwrap()
            .remove(0)
    }

    #[tokio::test]
    async fn test_unit_norm_and_dimensions() {
        let provider = LocalEmbeddingProvider::new(384);
        let embedding = embed_one(&provider, "Resistor X rated 10kΩ", EmbedKind::Passage).await;

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = LocalEmbeddingProvider::new(384);
        let text = "LM7805 regulator provides 5V at 1.5A";

        let first = embed_one(&provider, text, EmbedKind::Passage).await;
        let second = embed_one(&provider, text, EmbedKind::Passage).await;
        let other_instance = embed_one(&LocalEmbeddingProvider::new(384), text, EmbedKind::Passage).await;

        assert_eq!(first, second);
        assert_eq!(first, other_instance);
    }

    #[tokio::test]
    async fn test_query_and_passage_vectors_differ() {
        let provider = LocalEmbeddingProvider::new(384);
        let text = "tolerance of resistor X";

        let passage = embed_one(&provider, text, EmbedKind::Passage).await;
        let query = embed_one(&provider, text, EmbedKind::Query).await;

        assert_ne!(passage, query);
        assert!(cosine(&passage, &query) > 0.9);
    }

    #[tokio::test]
    async fn test_relevant_passage_scores_higher() {
        let provider = LocalEmbeddingProvider::new(384);
        let query = embed_one(&provider, "What is the tolerance of resistor X?", EmbedKind::Query).await;
        let relevant = embed_one(&provider, "Resistor X rated 10kΩ, tolerance 5%.", EmbedKind::Passage).await;
        let unrelated = embed_one(&provider, "Capacitor Y is an electrolytic part for 16V rails.", EmbedKind::Passage).await;

        assert!(cosine(&query, &relevant) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = LocalEmbeddingProvider::new(64);
        let embedding = embed_one(&provider, "", EmbedKind::Passage).await;

        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_load_term_weights_changes_model_name() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("datasheet-terms.yaml");
        std::fs::write(&path, "tolerance: 3.0\nLM7805: 2.5\n").unwrap();

        let provider = LocalEmbeddingProvider::load(&LocalConfig {
            embedding_model_path: Some(path),
            ..LocalConfig::default()
        })
        .unwrap();

        assert_eq!(provider.model_name(), "trigram-v1+datasheet-terms");
        assert_eq!(provider.term_weights.get("lm7805"), Some(&2.5));
    }

    #[test]
    fn test_missing_weights_file_is_model_load_error() {
        let err = LocalEmbeddingProvider::load(&LocalConfig {
            embedding_model_path: Some(PathBuf::from("/nonexistent/weights.yaml")),
            ..LocalConfig::default()
        })
        .unwrap_err();

        assert!(matches!(err, AppError::ModelLoad(_)));
    }

    #[test]
    fn test_malformed_weights_file_is_model_load_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("weights.json");
        std::fs::write(&path, "{\"tolerance\": \"high\"}").unwrap();

        let err = LocalEmbeddingProvider::load(&LocalConfig {
            embedding_model_path: Some(path),
            ..LocalConfig::default()
        })
        .unwrap_err();

        assert!(matches!(err, AppError::ModelLoad(_)));
    }
}
