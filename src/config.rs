//! Configuration loading and validation.
//!
//! Legal Lens is configured from a single TOML file (default
//! `./config/lens.toml`). Every section is optional; a missing section
//! takes the defaults shown below.
//!
//! ```toml
//! [index]
//! backend = "sqlite"            # or "memory"
//! path = "./data/lens.sqlite"
//!
//! [chunking]
//! target_tokens = 800
//! absorb_below = 400
//! merge_below = 250
//! hard_cap = 1000
//!
//! [retrieval]
//! user_top_k = 5
//! category_top_k = 3
//! min_user_matches = 3
//! similarity_threshold = 0.55
//! user_context = 3
//! category_context = 2
//!
//! [embedding]
//! provider = "ollama"           # disabled | openai | ollama | local
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [generation]
//! provider = "ollama"           # disabled | openai | ollama
//! model = "llama3.1"
//!
//! [storage]
//! root = "./data/uploads"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```
//!
//! Secrets are never read from this file. The OpenAI providers read
//! `OPENAI_API_KEY` from the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use legal_lens_core::chunk::ChunkPolicy;
use legal_lens_core::retrieve::RetrievalPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_index_path(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/lens.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,
    #[serde(default = "default_absorb_below")]
    pub absorb_below: usize,
    #[serde(default = "default_merge_below")]
    pub merge_below: usize,
    #[serde(default = "default_hard_cap")]
    pub hard_cap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: default_target_tokens(),
            absorb_below: default_absorb_below(),
            merge_below: default_merge_below(),
            hard_cap: default_hard_cap(),
        }
    }
}

impl ChunkingConfig {
    pub fn policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            target_tokens: self.target_tokens,
            absorb_below: self.absorb_below,
            merge_below: self.merge_below,
            hard_cap: self.hard_cap,
        }
    }
}

fn default_target_tokens() -> usize {
    800
}
fn default_absorb_below() -> usize {
    400
}
fn default_merge_below() -> usize {
    250
}
fn default_hard_cap() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_user_top_k")]
    pub user_top_k: usize,
    #[serde(default = "default_category_top_k")]
    pub category_top_k: usize,
    #[serde(default = "default_min_user_matches")]
    pub min_user_matches: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_user_context")]
    pub user_context: usize,
    #[serde(default = "default_category_context")]
    pub category_context: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            user_top_k: default_user_top_k(),
            category_top_k: default_category_top_k(),
            min_user_matches: default_min_user_matches(),
            similarity_threshold: default_similarity_threshold(),
            user_context: default_user_context(),
            category_context: default_category_context(),
        }
    }
}

impl RetrievalConfig {
    pub fn policy(&self) -> RetrievalPolicy {
        RetrievalPolicy {
            user_top_k: self.user_top_k,
            category_top_k: self.category_top_k,
            min_user_matches: self.min_user_matches,
            similarity_threshold: self.similarity_threshold,
            user_context: self.user_context,
            category_context: self.category_context,
        }
    }
}

fn default_user_top_k() -> usize {
    5
}
fn default_category_top_k() -> usize {
    3
}
fn default_min_user_matches() -> usize {
    3
}
fn default_similarity_threshold() -> f32 {
    0.55
}
fn default_user_context() -> usize {
    3
}
fn default_category_context() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_generation_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout_secs(),
            max_retries: default_generation_max_retries(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_generation_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/uploads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Read, parse, and validate the config file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.index.backend.as_str() {
        "sqlite" | "memory" => {}
        other => bail!(
            "Unknown index backend: '{}'. Must be sqlite or memory.",
            other
        ),
    }

    // Chunking
    let c = &config.chunking;
    if c.merge_below == 0 || c.absorb_below == 0 || c.target_tokens == 0 || c.hard_cap == 0 {
        bail!("chunking values must all be > 0");
    }
    if !(c.merge_below <= c.absorb_below
        && c.absorb_below <= c.target_tokens
        && c.target_tokens <= c.hard_cap)
    {
        bail!("chunking must satisfy merge_below <= absorb_below <= target_tokens <= hard_cap");
    }

    // Retrieval
    let r = &config.retrieval;
    if r.user_top_k == 0 || r.category_top_k == 0 {
        bail!("retrieval.user_top_k and retrieval.category_top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&r.similarity_threshold) {
        bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }

    // Embedding
    let e = &config.embedding;
    if e.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if e.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match e.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if e.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    e.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    // Generation
    let g = &config.generation;
    match g.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if g.model.is_none() {
                bail!(
                    "generation.model must be specified when provider is '{}'",
                    g.provider
                );
            }
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
