//! rag-embed - Embedding collaborator adapters
//!
//! This crate provides a deterministic, model-free embedder that hashes
//! word and character n-gram features into a fixed-length vector.
//!
//! # Features
//!
//! - Signed feature hashing with blake3
//! - Word unigrams plus character trigrams, so morphological variants
//!   ("lease", "leases", "leased") land close together
//! - L2 normalization
//! - Stable across sessions and platforms

mod hashing;

pub use hashing::HashingEmbedder;

// Re-export the Embedder trait for convenience
pub use rag_core::Embedder;
