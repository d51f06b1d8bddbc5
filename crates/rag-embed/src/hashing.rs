//! Feature-hashing embedder.

use async_trait::async_trait;
use tracing::debug;

use rag_core::{Embedder, Result};

/// Default embedding dimension.
const DEFAULT_DIMENSION: usize = 384;

/// Weight of a whole-word feature relative to a character trigram.
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic embedder based on signed feature hashing.
///
/// Each lowercase word contributes one word feature and the character
/// trigrams of `#word#`. A feature is hashed with blake3; the first eight
/// bytes choose the bucket and the ninth byte chooses the sign.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create a new embedder with the default dimension.
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Create an embedder with a custom dimension (minimum 1).
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.add_feature(&mut embedding, word.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = format!("#{}#", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut embedding, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        // L2 normalize
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        embedding
    }

    fn add_feature(&self, embedding: &mut [f32], feature: &[u8], weight: f32) {
        let hash = blake3::hash(feature);
        let bytes = hash.as_bytes();

        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&bytes[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

        embedding[index] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!("Embedding batch: size={}", texts.len());
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hashing_embedder() {
        let embedder = HashingEmbedder::new();

        assert_eq!(embedder.dimension(), 384);

        let texts = ["Hello world", "Rust is great"];
        let embeddings = embedder.embed_documents(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 384);
        assert_eq!(embeddings[1].len(), 384);

        // Check L2 normalization
        let norm: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_deterministic_embeddings() {
        let embedder = HashingEmbedder::new();

        let e1 = embedder.embed_query("operating lease cost").await.unwrap();
        let e2 = embedder.embed_query("operating lease cost").await.unwrap();

        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn test_related_texts_are_closer() {
        let embedder = HashingEmbedder::new();

        let query = embedder.embed_query("operating leases").await.unwrap();
        let related = embedder.embed_query("operating lease costs").await.unwrap();
        let unrelated = embedder.embed_query("quarterly dividend policy").await.unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::with_dimension(16);
        let embedding = embedder.embed_text("  ,, ");
        assert_eq!(embedding.len(), 16);
        assert!(embedding.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_custom_dimension() {
        let embedder = HashingEmbedder::with_dimension(64);
        assert_eq!(embedder.dimension(), 64);
        assert_eq!(embedder.embed_text("test").len(), 64);
        assert_eq!(HashingEmbedder::with_dimension(0).dimension(), 1);
    }
}
