//! Core traits defining the interfaces to external collaborators.

use async_trait::async_trait;

use crate::error::Result;

/// Embedding model trait.
///
/// Implementations must be deterministic for identical input within a
/// session and always return vectors of `dimension()` length.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of chunk texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Text generation model trait.
///
/// Used both to paraphrase queries and to answer from retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
