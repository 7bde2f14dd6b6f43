//! Embedding clients and the batch embedding driver.
//!
//! Defines the [`EmbeddingClient`] trait and two implementations:
//! - **[`OpenAiEmbeddings`]** — calls the OpenAI embeddings API.
//! - **[`MockEmbeddings`]** — deterministic content-hash vectors for tests
//!   and offline runs (`provider = "mock"`).
//!
//! [`BatchEmbedder`] drives a client over an ordered chunk sequence in
//! fixed-size batches, with bounded retries and progress reporting.
//!
//! Also provides vector utilities for the SQLite store:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! A call outcome is typed: transient failures (HTTP 429, 5xx, network
//! errors) are retried with exponential backoff — 1s, 2s, 4s, 8s, 16s, 32s
//! (exponent capped at 5) — while permanent failures (other 4xx, malformed
//! responses) fail the batch immediately. A batch that exhausts its retries
//! surfaces as [`IngestError::EmbeddingBatchFailed`] carrying the batch's
//! chunk fingerprints; the failure policy decides whether the run aborts or
//! records the batch and continues.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::error::{EmbedCallError, IngestError};
use crate::models::{ChunkRecord, FailurePolicy};
use crate::progress::{IngestProgressEvent, ProgressReporter};

/// A client for an external embedding service.
///
/// `embed` returns one vector per input text, in input order. Failures are
/// typed so the driver can distinguish retryable conditions from dead ends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier recorded with each index entry.
    fn model_name(&self) -> &str;
    /// Embedding dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedCallError>;
}

/// Instantiate the client named by the configuration.
pub fn create_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiEmbeddings::new(config)?)),
        "mock" => Ok(Box::new(MockEmbeddings::new(config.dims))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a single query string.
pub async fn embed_query(client: &dyn EmbeddingClient, text: &str) -> Result<Vec<f32>> {
    let mut vectors = client
        .embed(&[text.to_string()])
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    if vectors.is_empty() {
        bail!("Empty embedding response");
    }
    Ok(vectors.remove(0))
}

// ============ OpenAI client ============

/// Embedding client for the OpenAI embeddings API.
///
/// Requires the `OPENAI_API_KEY` environment variable. The endpoint base
/// is configurable for OpenAI-compatible services.
pub struct OpenAiEmbeddings {
    model: String,
    dims: usize,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedCallError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedCallError::Transient(format!("network error: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let parsed: EmbeddingResponse = response
                .json()
                .await
                .map_err(|e| EmbedCallError::Permanent(format!("invalid response body: {}", e)))?;
            return order_embeddings(parsed, texts.len());
        }

        let body_text = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            Err(EmbedCallError::Transient(format!(
                "API error {}: {}",
                status, body_text
            )))
        } else {
            Err(EmbedCallError::Permanent(format!(
                "API error {}: {}",
                status, body_text
            )))
        }
    }
}

/// Re-order response items by their `index` field and check the count, so
/// output position always matches input position.
fn order_embeddings(
    mut response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbedCallError> {
    if response.data.len() != expected {
        return Err(EmbedCallError::Permanent(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }
    response.data.sort_by_key(|item| item.index);
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}

// ============ Mock client ============

/// Deterministic offline embedding client.
///
/// Vectors are derived from a SHA-256 of the text, so identical content
/// always embeds to the identical (unit-normalized) vector. Useful for
/// integration tests and smoke runs without network access.
///
/// ```rust
/// use apogee::embedder::{EmbeddingClient, MockEmbeddings};
/// let mock = MockEmbeddings::new(8);
/// assert_eq!(mock.dims(), 8);
/// ```
pub struct MockEmbeddings {
    dims: usize,
}

impl MockEmbeddings {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddings {
    fn model_name(&self) -> &str {
        "mock-embeddings"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedCallError> {
        Ok(texts.iter().map(|t| hash_vector(t, self.dims)).collect())
    }
}

fn hash_vector(text: &str, dims: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(dims);
    let mut counter: u32 = 0;
    while values.len() < dims {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_le_bytes());
        hasher.update(text.as_bytes());
        for byte in hasher.finalize() {
            if values.len() == dims {
                break;
            }
            values.push(byte as f32 / 255.0 - 0.5);
        }
        counter += 1;
    }

    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut values {
            *v /= norm;
        }
    }
    values
}

// ============ Batch driver ============

/// Chunks paired with their vectors, in input order, plus any batches that
/// failed under [`FailurePolicy::SkipBatch`].
#[derive(Debug)]
pub struct EmbedOutcome {
    pub embedded: Vec<(ChunkRecord, Vec<f32>)>,
    pub failed_batches: Vec<IngestError>,
}

/// Drives an [`EmbeddingClient`] over an ordered chunk sequence.
///
/// Groups chunks into fixed-size batches to bound payload size and respect
/// rate limits, retries each batch with exponential backoff, and reports
/// progress after every successful batch.
pub struct BatchEmbedder<'a> {
    client: &'a dyn EmbeddingClient,
    batch_size: usize,
    max_retries: u32,
    backoff_base: Duration,
}

impl<'a> BatchEmbedder<'a> {
    pub fn new(client: &'a dyn EmbeddingClient, batch_size: usize, max_retries: u32) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            max_retries,
            backoff_base: Duration::from_secs(1),
        }
    }

    /// Override the backoff base delay. Tests use a millisecond base.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Embed `chunks` in order. Under [`FailurePolicy::Abort`] the first
    /// failed batch ends the call; under [`FailurePolicy::SkipBatch`] the
    /// failure is collected and the remaining batches proceed.
    pub async fn embed_chunks(
        &self,
        chunks: Vec<ChunkRecord>,
        policy: FailurePolicy,
        progress: &dyn ProgressReporter,
        document: &str,
    ) -> Result<EmbedOutcome, IngestError> {
        let total = chunks.len();
        let mut remaining = chunks;
        let mut embedded = Vec::with_capacity(total);
        let mut failed_batches = Vec::new();
        let mut done = 0usize;

        while !remaining.is_empty() {
            let take = remaining.len().min(self.batch_size);
            let rest = remaining.split_off(take);
            let batch = remaining;
            remaining = rest;

            match self.embed_batch(&batch).await {
                Ok(vectors) => {
                    done += batch.len();
                    progress.report(IngestProgressEvent::Embedding {
                        document: document.to_string(),
                        embedded: done,
                        total,
                    });
                    embedded.extend(batch.into_iter().zip(vectors));
                }
                Err(err) => match policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::SkipBatch => {
                        tracing::warn!("skipping failed batch: {}", err);
                        failed_batches.push(err);
                    }
                },
            }
        }

        Ok(EmbedOutcome {
            embedded,
            failed_batches,
        })
    }

    /// One batch: bounded attempts with exponential backoff on transient
    /// failures; permanent failures end the loop at once.
    async fn embed_batch(&self, batch: &[ChunkRecord]) -> Result<Vec<Vec<f32>>, IngestError> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let mut last_reason = String::from("no attempts made");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: base, 2x, 4x, ... capped at 32x
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.client.embed(&texts).await {
                Ok(vectors) => {
                    if vectors.len() != batch.len() {
                        return Err(batch_failure(
                            batch,
                            attempt + 1,
                            format!("expected {} vectors, got {}", batch.len(), vectors.len()),
                        ));
                    }
                    return Ok(vectors);
                }
                Err(EmbedCallError::Transient(reason)) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        attempts_allowed = self.max_retries + 1,
                        "transient embedding failure: {}",
                        reason
                    );
                    last_reason = reason;
                }
                Err(EmbedCallError::Permanent(reason)) => {
                    return Err(batch_failure(batch, attempt + 1, reason));
                }
            }
        }

        Err(batch_failure(batch, self.max_retries + 1, last_reason))
    }
}

fn batch_failure(batch: &[ChunkRecord], attempts: u32, reason: String) -> IngestError {
    IngestError::EmbeddingBatchFailed {
        fingerprints: batch.iter().map(|c| c.fingerprint.clone()).collect(),
        attempts,
        reason,
    }
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors, in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
