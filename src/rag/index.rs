//! In-memory vector index over the documentation corpus.
//!
//! Built once at startup, immutable afterwards. Queries are brute-force
//! cosine similarity, which is plenty for a corpus of a few thousand
//! sections.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use uuid::Uuid;

use crate::core::errors::AppError;
use crate::corpus::ContentSection;
use crate::llm::Embedder;

/// Metadata carried by every indexed passage.
#[derive(Debug, Clone, Serialize)]
pub struct PassageMetadata {
    pub object_id: Uuid,
    pub link: String,
    pub group_id: String,
}

/// One indexed unit: an embedding vector with its source text and metadata.
#[derive(Debug, Clone)]
pub struct EmbeddedPassage {
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: PassageMetadata,
}

/// A passage matched by a query, with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievalMatch {
    pub passage: EmbeddedPassage,
    pub score: f32,
}

/// Cumulative ingestion progress, reported so a caller can surface the
/// counts while the one-time index build runs.
#[derive(Debug, Clone, Copy)]
pub enum IngestStage {
    SegmentsConverted(usize),
    EmbeddingsComputed(usize),
    EmbeddingsStored(usize),
}

#[derive(Debug)]
pub struct EmbeddingIndex {
    passages: Vec<EmbeddedPassage>,
    dimensions: usize,
}

impl EmbeddingIndex {
    /// Embed the given sections and build the index.
    ///
    /// Sections with empty content carry no embeddable signal and are
    /// excluded. Each remaining stage reports its count through `report`.
    pub async fn ingest<F>(
        sections: Vec<ContentSection>,
        embedder: &dyn Embedder,
        mut report: F,
    ) -> Result<Self, AppError>
    where
        F: FnMut(IngestStage),
    {
        let embeddable: Vec<ContentSection> = sections
            .into_iter()
            .filter(|section| !section.content.is_empty())
            .collect();
        report(IngestStage::SegmentsConverted(embeddable.len()));

        let texts: Vec<String> = embeddable.iter().map(|s| s.content.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_all(&texts).await?
        };
        if vectors.len() != embeddable.len() {
            return Err(AppError::Embedding(format!(
                "expected {} embeddings, got {}",
                embeddable.len(),
                vectors.len()
            )));
        }
        report(IngestStage::EmbeddingsComputed(vectors.len()));

        let mut dimensions = 0;
        let mut passages = Vec::with_capacity(embeddable.len());
        for (section, vector) in embeddable.into_iter().zip(vectors) {
            if vector.is_empty() {
                return Err(AppError::Embedding(format!(
                    "empty embedding vector for section {}",
                    section.object_id
                )));
            }
            if dimensions == 0 {
                dimensions = vector.len();
            } else if vector.len() != dimensions {
                return Err(AppError::Embedding(format!(
                    "embedding dimensionality mismatch: {} != {}",
                    vector.len(),
                    dimensions
                )));
            }

            let ContentSection {
                object_id,
                group_id,
                link,
                content,
                ..
            } = section;
            passages.push(EmbeddedPassage {
                vector,
                text: content,
                metadata: PassageMetadata {
                    object_id,
                    link,
                    group_id,
                },
            });
        }
        report(IngestStage::EmbeddingsStored(passages.len()));

        Ok(Self {
            passages,
            dimensions,
        })
    }

    /// Nearest-neighbor query.
    ///
    /// Scores every stored passage against `question_vector`, keeps those
    /// at or above `min_score`, and returns at most `max_results` in
    /// descending score order. The sort is stable, so equal scores preserve
    /// ingestion order and repeated queries return identical results.
    ///
    /// An empty result is a valid outcome, not an error.
    pub fn query(
        &self,
        question_vector: &[f32],
        max_results: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievalMatch>, AppError> {
        if self.passages.is_empty() {
            return Ok(Vec::new());
        }
        if question_vector.len() != self.dimensions {
            return Err(AppError::Embedding(format!(
                "query vector has {} dimensions, index has {}",
                question_vector.len(),
                self.dimensions
            )));
        }

        let mut matches: Vec<RetrievalMatch> = self
            .passages
            .iter()
            .map(|passage| RetrievalMatch {
                passage: passage.clone(),
                score: cosine_similarity(question_vector, &passage.vector),
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(max_results);
        Ok(matches)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Shared handle through which the index is published exactly once after
/// ingestion completes.
///
/// Queries before publication observe a not-ready handle, which keeps
/// ingestion strictly before every query and stays distinguishable from an
/// index that is ready but holds no data.
#[derive(Clone, Default)]
pub struct IndexHandle {
    inner: Arc<OnceLock<EmbeddingIndex>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the built index. Returns `false` if one was already set.
    pub fn publish(&self, index: EmbeddingIndex) -> bool {
        self.inner.set(index).is_ok()
    }

    pub fn get(&self) -> Option<&EmbeddingIndex> {
        self.inner.get()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// Cosine similarity between two vectors of equal length.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
