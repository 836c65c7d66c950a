use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::errors::AppError;

/// Stream of answer tokens.
///
/// `Ok` items are tokens in arrival order. An `Err` item is terminal for
/// the stream. The channel closing without an error means the answer is
/// complete.
pub type TokenStream = mpsc::Receiver<Result<String, AppError>>;

/// Text-to-vector collaborator.
///
/// Deterministic for a given model and input; this core assumes no side
/// effects.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    /// Embed a batch of texts, preserving input order.
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError>;
}

/// Streaming generation collaborator.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start generating an answer for `prompt` and stream the tokens back.
    async fn stream_chat(&self, prompt: &str) -> Result<TokenStream, AppError>;
}
