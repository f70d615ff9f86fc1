use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

/// Computes a dense vector for a piece of text; the core assumes a fixed
/// output dimension and treats the model itself as opaque.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// # Errors
    /// Returns an error on a transport or model failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: Client,
    base_url: Url,
    model: String,
}

impl HttpEmbedder {
    /// # Errors
    /// Returns an error when the base URL cannot be parsed.
    pub fn new(base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build().context("failed to build embedder client")?,
            base_url: Url::parse(base_url).context("invalid embedding base URL")?,
            model,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let endpoint = self.base_url.join("v1/embed").context("invalid embed endpoint")?;
        let body = self
            .client
            .post(endpoint)
            .json(&EmbedRequest { model: &self.model, input: text })
            .send()
            .await
            .context("embedding request failed")?
            .error_for_status()
            .context("embedding service returned an error")?
            .json::<EmbedResponse>()
            .await
            .context("malformed embedding response")?;
        Ok(body.embedding)
    }
}

/// Cosine similarity between two vectors of equal dimension.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    f64::from(dot / (norm_a * norm_b))
}
