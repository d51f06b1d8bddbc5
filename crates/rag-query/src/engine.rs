//! Query engine for hybrid search.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use rag_core::{
    FusionMethod, RagError, Result, RetrievalResult, ScoredChunk, SearchConfig, SearchMode,
};
use rag_index::Corpus;

use crate::fusion::{reciprocal_rank_fusion, weighted_fusion};

/// Configuration for search queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    /// Maximum number of results to return.
    pub top_k: usize,

    /// Which indexes to consult.
    pub mode: SearchMode,

    /// Weight of the semantic signal in weighted fusion (0.0 to 1.0).
    pub alpha: f32,

    /// How hybrid candidates are combined.
    pub fusion: FusionMethod,

    /// RRF constant, used when `fusion` is reciprocal rank.
    pub rrf_k: u32,

    /// Hybrid mode fetches `top_k * candidate_multiplier` from each index...
    pub candidate_multiplier: usize,

    /// ...and at least this many.
    pub min_candidates: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::from_search_config(&SearchConfig::default())
    }
}

impl QueryConfig {
    /// Take defaults from the `[search]` section of the configuration.
    pub fn from_search_config(config: &SearchConfig) -> Self {
        Self {
            top_k: config.default_top_k,
            mode: config.mode,
            alpha: config.hybrid_alpha,
            fusion: config.fusion,
            rrf_k: config.rrf_k,
            candidate_multiplier: config.candidate_multiplier,
            min_candidates: config.min_candidates,
        }
    }

    /// Set the number of results.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the search mode.
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the semantic weight.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Size of the candidate list pulled from each index in hybrid mode.
    pub fn candidate_pool(&self) -> usize {
        self.top_k
            .saturating_mul(self.candidate_multiplier)
            .max(self.min_candidates)
            .max(self.top_k)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::invalid_argument("top_k must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(RagError::invalid_argument(format!(
                "alpha must be in [0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Hybrid search engine over a corpus snapshot.
///
/// Runs BM25 keyword search and exhaustive vector search, then fuses the
/// two candidate lists. Single-index modes return the index output as is.
#[derive(Debug, Clone)]
pub struct HybridSearchEngine {
    corpus: Arc<Corpus>,
}

impl HybridSearchEngine {
    /// Create a new engine.
    pub fn new(corpus: Arc<Corpus>) -> Self {
        Self { corpus }
    }

    /// The corpus being searched.
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Search with a query text and its embedding.
    ///
    /// The vector is ignored in keyword mode and may be empty there.
    pub fn search(&self, text: &str, vector: &[f32], config: &QueryConfig) -> Result<RetrievalResult> {
        config.validate()?;
        let start = Instant::now();

        debug!("Searching for {:?} ({} mode)", text, config.mode);

        let chunks = match config.mode {
            SearchMode::Semantic => self.corpus.vector().search(vector, config.top_k)?,
            SearchMode::Keyword => self.corpus.keyword().search(text, config.top_k)?,
            SearchMode::Hybrid => self.hybrid(text, vector, config)?,
        };

        for scored in &chunks {
            self.corpus.resolve(&scored.chunk_id)?;
        }

        info!(
            "Search completed in {}ms with {} results",
            start.elapsed().as_millis(),
            chunks.len()
        );

        Ok(RetrievalResult::new(chunks))
    }

    fn hybrid(&self, text: &str, vector: &[f32], config: &QueryConfig) -> Result<Vec<ScoredChunk>> {
        let pool = config.candidate_pool();

        let semantic = self.corpus.vector().search(vector, pool)?;
        let keyword = self.corpus.keyword().search(text, pool)?;

        debug!(
            "Vector search returned {} candidates, keyword search returned {}",
            semantic.len(),
            keyword.len()
        );

        let fused = match config.fusion {
            FusionMethod::Weighted => weighted_fusion(&semantic, &keyword, config.alpha, config.top_k),
            FusionMethod::ReciprocalRank => {
                reciprocal_rank_fusion(&[&semantic, &keyword], config.rrf_k, config.top_k)
            }
        };

        debug!("Fused to {} results", fused.len());
        Ok(fused)
    }
}
