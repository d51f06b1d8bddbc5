//! Inverted index scored with BM25.

use std::collections::HashMap;

use rag_core::{rank_scores, RagError, Result, ScoredChunk};

use crate::analyzer::analyze;

/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: u32,
    tf: u32,
}

/// Keyword index over analyzed chunk texts.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    /// Term -> postings, ordered by document position.
    postings: HashMap<String, Vec<Posting>>,

    /// Chunk id per document position.
    doc_ids: Vec<String>,

    /// Analyzed length per document position.
    doc_lengths: Vec<u32>,

    avg_doc_length: f32,

    params: Bm25Params,
}

impl KeywordIndex {
    /// Build an index from `(chunk_id, text)` pairs.
    pub fn build<'a, I>(params: Bm25Params, docs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_ids = Vec::new();
        let mut doc_lengths = Vec::new();

        for (doc, (chunk_id, text)) in docs.into_iter().enumerate() {
            let terms = analyze(text);
            doc_lengths.push(terms.len() as u32);
            doc_ids.push(chunk_id.to_string());

            let mut frequencies: HashMap<String, u32> = HashMap::new();
            for term in terms {
                *frequencies.entry(term).or_default() += 1;
            }
            for (term, tf) in frequencies {
                postings.entry(term).or_default().push(Posting {
                    doc: doc as u32,
                    tf,
                });
            }
        }

        let total: u64 = doc_lengths.iter().map(|&l| l as u64).sum();
        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            total as f32 / doc_lengths.len() as f32
        };

        Self {
            postings,
            doc_ids,
            doc_lengths,
            avg_doc_length,
            params,
        }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Mean analyzed chunk length.
    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_length
    }

    /// Inverse document frequency of an analyzed term.
    fn idf(&self, doc_freq: usize) -> f32 {
        let n = self.doc_ids.len() as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Search for the `k` chunks with the highest BM25 score.
    ///
    /// Only chunks sharing at least one term with the query are returned.
    /// Ties are broken by chunk id ascending.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::invalid_argument("k must be >= 1"));
        }

        let mut terms = analyze(query);
        terms.sort();
        terms.dedup();

        let Bm25Params { k1, b } = self.params;
        let mut scores: HashMap<u32, f32> = HashMap::new();

        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(postings.len());

            for posting in postings {
                let tf = posting.tf as f32;
                let length = self.doc_lengths[posting.doc as usize] as f32;
                let norm = if self.avg_doc_length > 0.0 {
                    1.0 - b + b * length / self.avg_doc_length
                } else {
                    1.0
                };
                *scores.entry(posting.doc).or_default() += idf * tf * (k1 + 1.0) / (tf + k1 * norm);
            }
        }

        Ok(rank_scores(
            scores
                .into_iter()
                .map(|(doc, score)| (self.doc_ids[doc as usize].clone(), score)),
            Some(k),
        ))
    }
}
