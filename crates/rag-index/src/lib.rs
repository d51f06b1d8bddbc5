//! rag-index - In-memory retrieval indexes
//!
//! This crate holds the corpus snapshot and the two indexes built over it:
//! an inverted index scored with BM25 and an exhaustive vector index scored
//! with cosine or dot-product similarity. A [`Corpus`] is immutable once
//! built and is shared behind an `Arc` by the query layer.

mod analyzer;
mod corpus;
mod keyword;
mod vector;

pub use analyzer::analyze;
pub use corpus::{read_records, Corpus, CorpusBuilder};
pub use keyword::{Bm25Params, KeywordIndex};
pub use vector::VectorIndex;
