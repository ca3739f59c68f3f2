//! In-memory vector index rebuilt wholesale on every upload batch.
//! Exact cosine similarity over every chunk; no approximate structure.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{AppError, RemoteCall};
use crate::llm_client::Embedder;

/// Upper bound on inputs per embedding request.
pub const EMBED_BATCH_SIZE: usize = 256;

/// A chunk returned by retrieval, with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
}

struct IndexedChunk {
    text: String,
    embedding: Vec<f32>,
}

pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    dimension: usize,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Embeds every chunk and assembles the index. All-or-nothing: any failed
    /// batch aborts the build.
    pub async fn build(chunks: Vec<String>, embedder: Arc<dyn Embedder>) -> Result<Self, AppError> {
        let mut entries = Vec::with_capacity(chunks.len());
        let mut dimension = 0;

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let vectors = embedder
                .embed(batch)
                .await
                .map_err(|e| AppError::remote(RemoteCall::Embedding, e))?;

            if vectors.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "expected {} embeddings, received {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for (text, embedding) in batch.iter().zip(vectors) {
                if dimension == 0 {
                    dimension = embedding.len();
                }
                if embedding.is_empty() || embedding.len() != dimension {
                    return Err(AppError::Embedding(format!(
                        "inconsistent embedding dimension: expected {dimension}, got {}",
                        embedding.len()
                    )));
                }
                entries.push(IndexedChunk {
                    text: text.clone(),
                    embedding,
                });
            }
            debug!("Embedded batch of {} chunks", batch.len());
        }

        info!("Built vector index: {} chunks, dimension {}", entries.len(), dimension);

        Ok(Self {
            entries,
            dimension,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Top-`k` chunks by cosine similarity to `query`, best first. Equal
    /// scores keep their insertion order.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, AppError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| AppError::remote(RemoteCall::Embedding, e))?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("no embedding returned for query".to_string()))?;

        if query_embedding.len() != self.dimension {
            return Err(AppError::Embedding(format!(
                "query embedding has dimension {}, index has {}",
                query_embedding.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                text: entry.text.clone(),
                score: cosine_similarity(&query_embedding, &entry.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    // Overflowing provider vectors give inf/inf; rank those as unrelated.
    if score.is_finite() {
        score
    } else {
        0.0
    }
}
