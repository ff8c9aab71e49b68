//! Configuration management for ElectroGPT.
//!
//! This module handles loading and merging configuration from multiple sources,
//! later sources winning:
//! - Built-in defaults
//! - Config file (`.electrogpt/config.yaml` or `ELECTROGPT_CONFIG`)
//! - Environment variables (a `.env` file is loaded first if present)
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::retry::RetryPolicy;
use crate::secret::Secret;

/// Where a model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Remote API reached over the network
    Hosted,
    /// Runs on this machine
    Local,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hosted" | "api" | "openai" => Ok(Self::Hosted),
            "local" => Ok(Self::Local),
            other => Err(AppError::Config(format!(
                "Unknown backend: {}. Supported: hosted, local",
                other
            ))),
        }
    }
}

/// Preferred place to end a chunk.
///
/// The chunker tries boundaries from the preferred one downwards
/// (paragraph → sentence → line → word) before cutting mid-word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkBoundary {
    Paragraph,
    Sentence,
    Word,
    Hard,
}

impl FromStr for ChunkBoundary {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paragraph" => Ok(Self::Paragraph),
            "sentence" => Ok(Self::Sentence),
            "word" => Ok(Self::Word),
            "hard" | "char" => Ok(Self::Hard),
            other => Err(AppError::Config(format!(
                "Unknown chunk boundary: {}. Supported: paragraph, sentence, word, hard",
                other
            ))),
        }
    }
}

/// Chunking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingConfig {
    /// Target chunk length in characters
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,

    /// Boundary preference
    pub boundary: ChunkBoundary,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            boundary: ChunkBoundary::Paragraph,
        }
    }
}

/// Retrieval and conversation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub k: usize,

    /// Chunks scoring below this cosine similarity are dropped
    pub min_score: Option<f32>,

    /// Prior turns included in the prompt
    pub memory_window: usize,

    /// Rewrite follow-up questions into standalone ones before retrieval
    pub condense_question: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 4,
            min_score: None,
            memory_window: 6,
            condense_question: true,
        }
    }
}

/// Embedding batch settings shared by both backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingBatchConfig {
    /// Chunks per embedding request
    pub batch_size: usize,

    /// Batches in flight at once
    pub max_concurrent_batches: usize,
}

impl Default for EmbeddingBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            max_concurrent_batches: 2,
        }
    }
}

/// Hosted (OpenAI-compatible) API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostedConfig {
    /// API base URL, including the version prefix
    pub endpoint: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Embedding model
    pub embedding_model: String,

    /// Embedding dimensions reported by the model
    pub embedding_dimensions: usize,

    /// Chat model
    pub chat_model: String,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            chat_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Local model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalConfig {
    /// Optional term-weight file for the in-process embedding model
    pub embedding_model_path: Option<PathBuf>,

    /// Dimensions of the in-process embedding model
    pub embedding_dimensions: usize,

    /// Ollama runtime URL used for local generation
    pub ollama_endpoint: String,

    /// Ollama model used for local generation
    pub ollama_model: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            embedding_model_path: None,
            embedding_dimensions: 384,
            ollama_endpoint: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
        }
    }
}

/// Generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Embedding backend
    pub embedder_backend: Backend,

    /// Language model backend
    pub llm_backend: Backend,

    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingBatchConfig,
    pub hosted: HostedConfig,
    pub local: LocalConfig,
    pub generation: GenerationConfig,
    pub retry: RetryPolicy,

    /// Optional prompt definition overriding the built-in one
    pub prompt_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    #[serde(skip)]
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Config file this configuration was read from
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            embedder_backend: Backend::Hosted,
            llm_backend: Backend::Hosted,
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingBatchConfig::default(),
            hosted: HostedConfig::default(),
            local: LocalConfig::default(),
            generation: GenerationConfig::default(),
            retry: RetryPolicy::default(),
            prompt_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            config_file: None,
        }
    }
}

/// Command-line overrides; `None` leaves the loaded value in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub embedder_backend: Option<Backend>,
    pub llm_backend: Option<Backend>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub retrieval_k: Option<usize>,
    pub log_level: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `ELECTROGPT_CONFIG`: Path to config file
    /// - `ELECTROGPT_EMBEDDER`: Embedding backend (hosted, local)
    /// - `ELECTROGPT_LLM`: Language model backend (hosted, local)
    /// - `ELECTROGPT_CHUNK_SIZE`, `ELECTROGPT_CHUNK_OVERLAP`, `ELECTROGPT_RETRIEVAL_K`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use electro_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Embedder: {}", config.embedder_backend);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None)
    }

    /// Like [`AppConfig::load`], with an explicit config file taking
    /// precedence over `ELECTROGPT_CONFIG`.
    pub fn load_with(config_file: Option<&Path>) -> AppResult<Self> {
        // A missing .env file is normal
        dotenvy::dotenv().ok();

        let config_path = match config_file {
            Some(path) => path.to_path_buf(),
            None => std::env::var("ELECTROGPT_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_config_path()),
        };

        let mut config = Self::load_file(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to defaults when the
    /// file does not exist.
    pub fn load_file(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut config: AppConfig = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.config_file = Some(path.to_path_buf());

        tracing::debug!("Loaded config file {:?}", path);
        Ok(config)
    }

    /// Apply environment variable overrides using `lookup` to read them.
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("ELECTROGPT_EMBEDDER") {
            self.embedder_backend = backend.parse()?;
        }

        if let Some(backend) = lookup("ELECTROGPT_LLM") {
            self.llm_backend = backend.parse()?;
        }

        if let Some(size) = lookup("ELECTROGPT_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_number("ELECTROGPT_CHUNK_SIZE", &size)?;
        }

        if let Some(overlap) = lookup("ELECTROGPT_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_number("ELECTROGPT_CHUNK_OVERLAP", &overlap)?;
        }

        if let Some(k) = lookup("ELECTROGPT_RETRIEVAL_K") {
            self.retrieval.k = parse_number("ELECTROGPT_RETRIEVAL_K", &k)?;
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }

        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over the config file and environment.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(backend) = overrides.embedder_backend {
            self.embedder_backend = backend;
        }

        if let Some(backend) = overrides.llm_backend {
            self.llm_backend = backend;
        }

        if let Some(size) = overrides.chunk_size {
            self.chunking.chunk_size = size;
        }

        if let Some(overlap) = overrides.chunk_overlap {
            self.chunking.chunk_overlap = overlap;
        }

        if let Some(k) = overrides.retrieval_k {
            self.retrieval.k = k;
        }

        if let Some(level) = overrides.log_level {
            self.log_level = Some(level);
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }

        self
    }

    /// Read the hosted API key from its configured environment variable.
    pub fn resolve_api_key(&self) -> Option<Secret> {
        Secret::from_env(&self.hosted.api_key_env)
    }

    /// Whether either backend talks to the hosted API.
    pub fn uses_hosted(&self) -> bool {
        self.embedder_backend == Backend::Hosted || self.llm_backend == Backend::Hosted
    }

    /// Validate option ranges and credential availability.
    pub fn validate(&self) -> AppResult<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be positive".to_string()));
        }

        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }

        if self.retrieval.k == 0 {
            return Err(AppError::Config("retrieval k must be positive".to_string()));
        }

        if self.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "retry maxAttempts must be at least 1".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 || self.embedding.max_concurrent_batches == 0 {
            return Err(AppError::Config(
                "embedding batchSize and maxConcurrentBatches must be positive".to_string(),
            ));
        }

        if self.uses_hosted() && self.resolve_api_key().is_none() {
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                self.hosted.api_key_env
            )));
        }

        Ok(())
    }
}

/// Default config file location relative to the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(".electrogpt").join("config.yaml")
}

fn parse_number(key: &str, value: &str) -> AppResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a positive integer, got {:?}", key, value)))
}
