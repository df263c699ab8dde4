//! Embedding providers.
//!
//! Concrete implementations of the core [`Embedder`] trait:
//! - **[`DisabledEmbedder`]**: always fails, so every caller degrades to
//!   the deterministic fallback vector.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API with batching,
//!   retry, and backoff.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed`.
//! - **`LocalEmbedder`**: runs a model in process via fastembed (requires
//!   the `local-embeddings` feature).
//!
//! # Degradation
//!
//! Pipelines never call [`Embedder::embed`] directly. They go through
//! [`embed_or_fallback`], which substitutes [`fallback_vector`] for the whole
//! batch when the provider fails or returns the wrong shape, logs a
//! warning, and marks the result as degraded.
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use legal_lens_core::embedding::{fallback_vector, Embedder};
use legal_lens_core::error::{EmbedError, Recovered};

use crate::config::EmbeddingConfig;
use crate::http;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Embed `texts`, substituting deterministic fallback vectors on failure.
///
/// The provider's output is accepted only if it has one vector per text and
/// every vector has [`Embedder::dims`] components. Anything else replaces
/// the whole batch, so a document never mixes real and fallback vectors.
pub async fn embed_or_fallback(
    embedder: &dyn Embedder,
    texts: &[String],
) -> Recovered<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Recovered::ok(Vec::new());
    }

    let dims = embedder.dims();
    let reason = match embedder.embed(texts).await {
        Ok(vectors) if vectors.len() != texts.len() => format!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        ),
        Ok(vectors) => match vectors.iter().find(|v| v.len() != dims) {
            Some(bad) => format!(
                "provider returned a {}-dim vector, expected {}",
                bad.len(),
                dims
            ),
            None => return Recovered::ok(vectors),
        },
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        model = embedder.model_name(),
        texts = texts.len(),
        reason = %reason,
        "embedding degraded to fallback vectors"
    );
    Recovered::degraded(texts.iter().map(|t| fallback_vector(t, dims)).collect())
}

/// Embed a single query text with fallback.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Recovered<Vec<f32>> {
    let Recovered { value, degraded } = embed_or_fallback(embedder, &[text.to_string()]).await;
    let vector = value
        .into_iter()
        .next()
        .unwrap_or_else(|| fallback_vector(text, embedder.dims()));
    Recovered { value: vector, degraded }
}

// ============ Disabled Provider ============

/// Used when `embedding.provider = "disabled"`. Every call fails.
pub struct DisabledEmbedder {
    dims: usize,
}

impl DisabledEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Disabled)
    }
}

fn as_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

// ============ OpenAI Provider ============

/// Calls `POST {url}/v1/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;

        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(k) => k,
            Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
        };

        Ok(Self {
            model,
            dims: config.dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let endpoint = format!("{}/v1/embeddings", self.url.trim_end_matches('/'));
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
                "dimensions": self.dims,
            });
            let json = http::post_json_with_retry(
                &self.client,
                &endpoint,
                Some(&self.api_key),
                &body,
                self.max_retries,
                "OpenAI",
            )
            .await?;
            out.extend(parse_openai_response(&json)?);
        }

        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbedError::Malformed("OpenAI response missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let vec = item
            .get("embedding")
            .and_then(as_vector)
            .ok_or_else(|| EmbedError::Malformed("OpenAI response missing embedding".into()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Calls `POST {url}/api/embed` on a running Ollama instance
/// (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;

        Ok(Self {
            model,
            dims: config.dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = http::post_json_with_retry(
                &self.client,
                &endpoint,
                None,
                &body,
                self.max_retries,
                "Ollama",
            )
            .await?;
            out.extend(parse_ollama_response(&json)?);
        }

        Ok(out)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbedError::Malformed("Ollama response missing embeddings array".into()))?;

    embeddings
        .iter()
        .map(|e| {
            as_vector(e).ok_or_else(|| {
                EmbedError::Malformed("Ollama response embedding is not an array".into())
            })
        })
        .collect()
}

// ============ Local Provider (fastembed) ============

#[cfg(feature = "local-embeddings")]
mod local {
    use std::sync::{Arc, Mutex};

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use legal_lens_core::embedding::Embedder;
    use legal_lens_core::error::EmbedError;

    use crate::config::EmbeddingConfig;

    const DEFAULT_LOCAL_MODEL: &str = "bge-base-en-v1.5";

    /// In-process embeddings. The model is downloaded from Hugging Face on
    /// first use and cached; later runs need no network.
    pub struct LocalEmbedder {
        model_name: String,
        dims: usize,
        batch_size: usize,
        model: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
    }

    impl LocalEmbedder {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
            let (_, dims) = to_fastembed_model(&model_name)?;
            if dims != config.dims {
                tracing::warn!(
                    model = %model_name,
                    model_dims = dims,
                    configured_dims = config.dims,
                    "local model dimensionality overrides embedding.dims"
                );
            }
            Ok(Self {
                model_name,
                dims,
                batch_size: config.batch_size.max(1),
                model: Arc::new(Mutex::new(None)),
            })
        }
    }

    fn to_fastembed_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
        match name {
            "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
            "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
            "bge-large-en-v1.5" => Ok((fastembed::EmbeddingModel::BGELargeENV15, 1024)),
            "nomic-embed-text-v1.5" => Ok((fastembed::EmbeddingModel::NomicEmbedTextV15, 768)),
            "multilingual-e5-base" => Ok((fastembed::EmbeddingModel::MultilingualE5Base, 768)),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, multilingual-e5-base",
                other
            ),
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }
        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            let (variant, _) =
                to_fastembed_model(&self.model_name).map_err(|e| EmbedError::Request(e.to_string()))?;
            let slot = self.model.clone();
            let batch_size = self.batch_size;
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut guard = slot
                    .lock()
                    .map_err(|_| EmbedError::Request("local model lock poisoned".into()))?;
                if guard.is_none() {
                    let model = fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(variant).with_show_download_progress(false),
                    )
                    .map_err(|e| {
                        EmbedError::Request(format!("failed to initialize local model: {}", e))
                    })?;
                    *guard = Some(model);
                }
                let model = guard
                    .as_mut()
                    .ok_or_else(|| EmbedError::Request("local model unavailable".into()))?;
                model
                    .embed(texts, Some(batch_size))
                    .map_err(|e| EmbedError::Request(format!("local embedding failed: {}", e)))
            })
            .await
            .map_err(|e| EmbedError::Request(e.to_string()))?
        }
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

/// Build the configured [`Embedder`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (needs the `local-embeddings` feature) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder::new(config.dims))),
        "openai" => Ok(Box::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Box::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
