//! rag-query - Search and ranking engine
//!
//! This crate provides hybrid search combining vector similarity and BM25
//! keyword search, and multi-query retrieval that searches paraphrases of a
//! question and merges the results.
//!
//! # Features
//!
//! - Semantic, keyword and hybrid search modes
//! - Weighted min-max score fusion (default) or Reciprocal Rank Fusion
//! - Concurrent sub-query dispatch with an order-independent max-score merge
//! - All parameters passed at call time through [`QueryConfig`]
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_query::{HybridSearchEngine, QueryConfig};
//! use std::sync::Arc;
//!
//! let engine = HybridSearchEngine::new(Arc::new(corpus));
//! let query_vector = embedder.embed_query("operating lease cost").await?;
//! let results = engine.search("operating lease cost", &query_vector, &QueryConfig::default())?;
//! ```

mod engine;
mod fusion;
mod multi_query;

pub use engine::{HybridSearchEngine, QueryConfig};
pub use fusion::{merge_max, min_max_normalize, reciprocal_rank_fusion, weighted_fusion};
pub use multi_query::{MultiQueryConfig, MultiQueryRetriever};

// Re-export for convenience
pub use rag_core::{RetrievalResult, ScoredChunk, SearchMode};
