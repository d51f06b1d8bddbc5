//! Multi-query retrieval: search every paraphrase and merge.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use rag_core::{Embedder, Generator, RagConfig, RagError, Result, RetrievalResult, SearchMode};
use rag_generate::QueryExpander;

use crate::engine::{HybridSearchEngine, QueryConfig};
use crate::fusion::merge_max;

/// Configuration for a multi-query retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiQueryConfig {
    /// Search the original query alongside the paraphrases.
    pub include_original: bool,

    /// Number of paraphrases to request.
    pub n_expansions: usize,

    /// Per-query search settings; `top_k` is the per-query k.
    pub query: QueryConfig,

    /// Cap on the merged result.
    pub max_results: Option<usize>,
}

impl Default for MultiQueryConfig {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

impl MultiQueryConfig {
    /// Take defaults from the `[expansion]` and `[search]` sections.
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            include_original: config.expansion.include_original,
            n_expansions: config.expansion.n_expansions,
            query: QueryConfig::from_search_config(&config.search),
            max_results: config.expansion.max_results,
        }
    }
}

/// Expands a query, searches every variant concurrently and merges the
/// results by maximum score.
pub struct MultiQueryRetriever<E: ?Sized, G: ?Sized> {
    engine: HybridSearchEngine,
    embedder: Arc<E>,
    expander: QueryExpander<G>,
}

impl<E, G> MultiQueryRetriever<E, G>
where
    E: Embedder + ?Sized,
    G: Generator + ?Sized,
{
    /// Create a new retriever.
    pub fn new(engine: HybridSearchEngine, embedder: Arc<E>, expander: QueryExpander<G>) -> Self {
        Self {
            engine,
            embedder,
            expander,
        }
    }

    /// The underlying single-query engine.
    pub fn engine(&self) -> &HybridSearchEngine {
        &self.engine
    }

    /// Build the list of queries to search, original first.
    pub async fn query_set(&self, query: &str, config: &MultiQueryConfig) -> Result<Vec<String>> {
        let mut queries = Vec::with_capacity(config.n_expansions + 1);
        if config.include_original {
            queries.push(query.to_string());
        }
        queries.extend(self.expander.expand(query, config.n_expansions).await?);
        Ok(queries)
    }

    /// Retrieve chunks for `query` and all of its paraphrases.
    ///
    /// Fails as a whole if any sub-query fails, naming the first failing
    /// query in query-set order.
    pub async fn retrieve(&self, query: &str, config: &MultiQueryConfig) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(RagError::invalid_argument("query must not be empty"));
        }
        config.query.validate()?;

        let start = Instant::now();
        let queries = self.query_set(query, config).await?;
        if queries.is_empty() {
            return Err(RagError::invalid_argument(
                "query set is empty: include_original is off and n_expansions is 0",
            ));
        }

        debug!("Dispatching {} sub-queries", queries.len());

        let outcomes = join_all(queries.iter().map(|q| self.search_one(q, &config.query))).await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_failure = None;
        let mut failed = 0;

        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Sub-query {} ({:?}) failed: {}", index, queries[index], e);
                    failed += 1;
                    if first_failure.is_none() {
                        first_failure = Some((index, e));
                    }
                }
            }
        }

        if let Some((query_index, source)) = first_failure {
            return Err(RagError::AggregateRetrieval {
                query_index,
                query: queries[query_index].clone(),
                failed,
                source: Box::new(source),
            });
        }

        let merged = merge_max(results, config.max_results);

        info!(
            "Multi-query retrieval over {} queries returned {} chunks in {}ms",
            queries.len(),
            merged.len(),
            start.elapsed().as_millis()
        );

        Ok(merged)
    }

    /// Embed on the calling task, then score on the blocking pool so the
    /// index scans of different sub-queries run in parallel.
    async fn search_one(&self, query: &str, config: &QueryConfig) -> Result<RetrievalResult> {
        let vector = match config.mode {
            SearchMode::Keyword => Vec::new(),
            SearchMode::Semantic | SearchMode::Hybrid => self.embedder.embed_query(query).await?,
        };

        let engine = self.engine.clone();
        let text = query.to_string();
        let config = config.clone();
        tokio::task::spawn_blocking(move || engine.search(&text, &vector, &config))
            .await
            .map_err(|e| RagError::internal(format!("search task failed: {}", e)))?
    }
}
