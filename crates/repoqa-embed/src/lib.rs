#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Embedding-service boundary.
//!
//! The embedding model itself is an opaque external service: this crate
//! only knows how to hand it batches of texts and validate what comes back.
//! `APP_USE_FAKE_EMBEDDINGS=1` swaps in a deterministic offline embedder so
//! the rest of the pipeline can be exercised without credentials.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DIM: usize = 1536;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `remote:...:d1536`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Compute embeddings for a batch of input texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Client for an OpenAI-style `/embeddings` endpoint.
pub struct RemoteEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dim: usize,
    id: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dim: usize,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let model = model.into();
        let id = format!("remote:{model}:d{dim}");
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model,
            dim,
            id,
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!(
                "embedding service returned HTTP {} for {url}",
                response.status()
            );
        }
        let body: EmbeddingResponse = response.json().await?;
        if body.data.len() != texts.len() {
            bail!(
                "embedding service returned {} vectors for {} inputs",
                body.data.len(),
                texts.len()
            );
        }
        let mut vectors = Vec::with_capacity(body.data.len());
        for row in body.data {
            if row.embedding.len() != self.dim {
                bail!(
                    "embedding service returned dimension {}, expected {}",
                    row.embedding.len(),
                    self.dim
                );
            }
            vectors.push(row.embedding);
        }
        Ok(vectors)
    }
}

/// Deterministic hashed bag-of-words embedder for offline runs and tests.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            id: format!("fake:xxhash:d{dim}"),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// True when `APP_USE_FAKE_EMBEDDINGS` requests the deterministic offline
/// embedder. Consumers that also talk to remote services (the answer
/// boundary) use this to stay offline as a whole.
pub fn offline_mode() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Selects the fake embedder when `APP_USE_FAKE_EMBEDDINGS` is set,
/// otherwise builds a remote client from `OPENAI_API_KEY`.
pub fn default_embedder(base_url: &str, model: &str, dim: usize) -> Result<Arc<dyn Embedder>> {
    if offline_mode() {
        tracing::info!(dim, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(dim)));
    }
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| anyhow!("OPENAI_API_KEY is not set (or set APP_USE_FAKE_EMBEDDINGS=1)"))?;
    Ok(Arc::new(RemoteEmbedder::new(base_url, model, dim, api_key)?))
}
