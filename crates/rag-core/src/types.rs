//! Core domain types for the retrieval engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::RagError;

/// Which retrieval signal a search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Vector index only.
    Semantic,
    /// Keyword index only.
    Keyword,
    /// Both indexes, fused.
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "semantic" | "vector" => Ok(Self::Semantic),
            "keyword" | "lexical" => Ok(Self::Keyword),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(RagError::invalid_argument(format!(
                "unknown search mode '{}', expected semantic, keyword or hybrid",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{}", s)
    }
}

/// Similarity function of the vector index, fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    #[default]
    Cosine,
    DotProduct,
}

impl FromStr for Similarity {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" | "dot_product" | "inner_product" => Ok(Self::DotProduct),
            other => Err(RagError::invalid_argument(format!(
                "unknown similarity '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Similarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::DotProduct => write!(f, "dot_product"),
        }
    }
}

/// Rule used to combine semantic and keyword candidates in hybrid mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    /// `alpha * norm(semantic) + (1 - alpha) * norm(keyword)`.
    #[default]
    Weighted,
    /// Sum of `1 / (rrf_k + rank)` over both lists.
    ReciprocalRank,
}

impl FromStr for FusionMethod {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weighted" => Ok(Self::Weighted),
            "rrf" | "reciprocal_rank" => Ok(Self::ReciprocalRank),
            other => Err(RagError::invalid_argument(format!(
                "unknown fusion method '{}'",
                other
            ))),
        }
    }
}

/// Length limit applied when assembling a grounding prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "unit", content = "limit")]
pub enum ContextBudget {
    Characters(usize),
    /// Approximate tokens, estimated at four characters per token.
    Tokens(usize),
}

impl ContextBudget {
    /// The budget limit in its own unit.
    pub fn limit(&self) -> usize {
        match self {
            Self::Characters(n) | Self::Tokens(n) => *n,
        }
    }

    /// Cost of a piece of text in this budget's unit.
    pub fn cost(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self {
            Self::Characters(_) => chars,
            Self::Tokens(_) => chars.div_ceil(4),
        }
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::Characters(4000)
    }
}

/// A retrievable unit of text with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier supplied by the ingestion collaborator.
    pub chunk_id: String,

    /// Chunk text content.
    pub text: String,

    /// Embedding vector (fixed configured dimension).
    pub embedding: Vec<f32>,

    /// Source document URI.
    pub source_uri: String,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        source_uri: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            embedding,
            source_uri: source_uri.into(),
        }
    }
}

/// A chunk as supplied by the ingestion collaborator, before embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub text: String,
    #[serde(default)]
    pub source_uri: String,
}

impl ChunkRecord {
    pub fn new(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        source_uri: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            source_uri: source_uri.into(),
        }
    }
}

/// A chunk reference with a query-specific score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Referenced chunk.
    pub chunk_id: String,

    /// Relevance score (higher is better).
    pub score: f32,

    /// Result rank (1-indexed).
    pub rank: u32,
}

impl ScoredChunk {
    /// Ordering used everywhere results are ranked: score descending, then
    /// chunk id ascending.
    pub fn ranking_order(a: &Self, b: &Self) -> Ordering {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    }
}

/// Turn `(chunk_id, score)` pairs into ranked results.
///
/// Sorts by score descending with chunk id ascending as the tie-break,
/// truncates to `limit` when given and assigns 1-based ranks. Ids are
/// expected to be unique.
pub fn rank_scores<I>(scores: I, limit: Option<usize>) -> Vec<ScoredChunk>
where
    I: IntoIterator<Item = (String, f32)>,
{
    let mut ranked: Vec<ScoredChunk> = scores
        .into_iter()
        .map(|(chunk_id, score)| ScoredChunk {
            chunk_id,
            score,
            rank: 0,
        })
        .collect();

    ranked.sort_by(ScoredChunk::ranking_order);

    if let Some(limit) = limit {
        ranked.truncate(limit);
    }

    for (i, scored) in ranked.iter_mut().enumerate() {
        scored.rank = i as u32 + 1;
    }

    ranked
}

/// A search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Ordered, deduplicated retrieval output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Scored chunks in rank order.
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    /// Wrap already-ranked chunks.
    pub fn new(chunks: Vec<ScoredChunk>) -> Self {
        Self { chunks }
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk ids in rank order.
    pub fn chunk_ids(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.chunk_id.as_str()).collect()
    }

    /// Iterate over scored chunks in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.chunks.iter()
    }

    /// Score of a chunk, if present.
    pub fn score_of(&self, chunk_id: &str) -> Option<f32> {
        self.chunks
            .iter()
            .find(|c| c.chunk_id == chunk_id)
            .map(|c| c.score)
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredChunk;
    type IntoIter = std::vec::IntoIter<ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

/// Generated answer with the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    /// Generated text.
    pub text: String,

    /// Chunk ids included in the prompt, in inclusion order.
    pub citations: Vec<String>,
}

/// Statistics about a corpus snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Number of chunks.
    pub chunks: usize,

    /// Number of distinct keyword terms.
    pub terms: usize,

    /// Embedding dimension.
    pub dimension: usize,

    /// Vector similarity function.
    pub similarity: Similarity,

    /// Mean number of analyzed terms per chunk.
    pub avg_chunk_terms: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_from_str() {
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert_eq!("SEMANTIC".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert_eq!("Keyword".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert!("fuzzy".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::default(), SearchMode::Hybrid);
    }

    #[test]
    fn test_search_mode_serde() {
        let json = serde_json::to_string(&SearchMode::Semantic).unwrap();
        assert_eq!(json, "\"semantic\"");
        let mode: SearchMode = serde_json::from_str("\"keyword\"").unwrap();
        assert_eq!(mode, SearchMode::Keyword);
    }

    #[test]
    fn test_rank_scores_tie_break() {
        let ranked = rank_scores(
            vec![
                ("c".to_string(), 0.5),
                ("a".to_string(), 0.5),
                ("b".to_string(), 0.9),
            ],
            None,
        );

        let ids: Vec<_> = ranked.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_rank_scores_limit() {
        let ranked = rank_scores(
            (0..10).map(|i| (format!("c{}", i), i as f32)),
            Some(3),
        );
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].chunk_id, "c9");
    }

    #[test]
    fn test_context_budget_cost() {
        let chars = ContextBudget::Characters(100);
        let tokens = ContextBudget::Tokens(100);
        assert_eq!(chars.cost("hello"), 5);
        assert_eq!(tokens.cost("hello"), 2);
        assert_eq!(tokens.cost(""), 0);
        assert_eq!(tokens.limit(), 100);
    }

    #[test]
    fn test_chunk_record_default_source() {
        let record: ChunkRecord =
            serde_json::from_str(r#"{"chunk_id":"a","text":"lease costs"}"#).unwrap();
        assert_eq!(record.source_uri, "");
    }
}
