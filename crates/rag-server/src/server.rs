//! Request/response server implementation.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use rag_core::{
    BudgetUnit, Embedder, Generator, RagConfig, RagError, Result, RetrievalResult, SearchMode,
};
use rag_embed::HashingEmbedder;
use rag_generate::{AnswerSynthesizer, QueryExpander};
use rag_index::Corpus;
use rag_query::{HybridSearchEngine, MultiQueryConfig, MultiQueryRetriever, QueryConfig};

/// RAG server state.
pub struct RagServer {
    /// Loaded configuration.
    config: RagConfig,

    /// Corpus snapshot.
    corpus: Arc<Corpus>,

    /// Query embedder.
    embedder: Arc<dyn Embedder>,

    /// Single-query engine.
    engine: HybridSearchEngine,

    /// Paraphrase generator for `rag_expand`.
    expander: QueryExpander<dyn Generator>,

    /// Multi-query retriever.
    retriever: MultiQueryRetriever<dyn Embedder, dyn Generator>,

    /// Answer synthesizer.
    synthesizer: AnswerSynthesizer<dyn Generator>,
}

/// Search request parameters.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SearchParams {
    /// The search query.
    pub query: String,

    /// Maximum number of results (default from config, capped at `max_top_k`).
    pub top_k: Option<usize>,

    /// Search mode (default from config).
    pub mode: Option<SearchMode>,

    /// Semantic weight for hybrid mode (default from config).
    pub alpha: Option<f32>,
}

/// Multi-query retrieval parameters.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetrieveParams {
    /// The question to retrieve for.
    pub query: String,

    /// Results per sub-query.
    pub top_k: Option<usize>,

    /// Search mode for every sub-query.
    pub mode: Option<SearchMode>,

    /// Number of paraphrases.
    pub n_expansions: Option<usize>,

    /// Whether to search the original query too.
    pub include_original: Option<bool>,

    /// Cap on the merged result.
    pub max_results: Option<usize>,
}

/// Expansion parameters.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ExpandParams {
    /// The query to paraphrase.
    pub query: String,

    /// Number of paraphrases.
    pub n: Option<usize>,
}

/// Question answering parameters.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AskParams {
    /// The question.
    pub query: String,

    /// Results per query.
    pub top_k: Option<usize>,

    /// Search mode.
    pub mode: Option<SearchMode>,

    /// Paraphrases to search; 0 or unset runs a single search.
    pub n_expansions: Option<usize>,

    /// Context budget limit.
    pub context_budget: Option<usize>,

    /// Unit of `context_budget`.
    pub budget_unit: Option<BudgetUnit>,
}

/// Tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the operation was successful.
    pub success: bool,

    /// Result message or content.
    pub message: String,

    /// Stable error code on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Structured result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
            data: Some(data),
        }
    }

    pub fn error(context: &str, error: &RagError) -> Self {
        Self {
            success: false,
            message: format!("{}: {}", context, error),
            error_code: Some(error.error_code().to_string()),
            data: None,
        }
    }

    fn with_data<T: Serialize>(message: String, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::success(message, value),
            Err(e) => Self::error("Failed to encode result", &RagError::from(e)),
        }
    }
}

impl RagServer {
    /// Create a server over an already-built corpus.
    ///
    /// The embedder must produce vectors of the corpus dimension.
    pub fn new(
        corpus: Arc<Corpus>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        config: RagConfig,
    ) -> Result<Self> {
        if embedder.dimension() != corpus.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: corpus.dimension(),
                actual: embedder.dimension(),
            });
        }

        info!(
            "Initializing RAG server with {} chunks, generator {}",
            corpus.len(),
            generator.model_name()
        );

        let engine = HybridSearchEngine::new(corpus.clone());
        let expander = QueryExpander::new(generator.clone(), &config.generation);
        let retriever = MultiQueryRetriever::new(
            engine.clone(),
            embedder.clone(),
            QueryExpander::new(generator.clone(), &config.generation),
        );
        let synthesizer = AnswerSynthesizer::new(corpus.clone(), generator, &config.generation);

        Ok(Self {
            config,
            corpus,
            embedder,
            engine,
            expander,
            retriever,
            synthesizer,
        })
    }

    /// Load the corpus file named by `config.corpus_path` and embed it with
    /// a [`HashingEmbedder`] of the configured dimension.
    pub async fn load(config: RagConfig, generator: Arc<dyn Generator>) -> Result<Self> {
        info!("Loading corpus from {:?}", config.corpus_path);

        let embedder = Arc::new(HashingEmbedder::with_dimension(config.index.dimension));
        let corpus =
            Corpus::load_jsonl(&config.corpus_path, embedder.as_ref(), config.index.clone()).await?;

        Self::new(Arc::new(corpus), embedder, generator, config)
    }

    /// The corpus being served.
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Get the server info.
    pub fn info() -> ServerInfo {
        ServerInfo {
            name: "rag-hybrid".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Local hybrid search and multi-query RAG engine".to_string(),
        }
    }

    /// List available tools.
    pub fn tools() -> Vec<ToolInfo> {
        vec![
            ToolInfo {
                name: "rag_search".to_string(),
                description: "Search the corpus with hybrid, semantic or keyword ranking".to_string(),
            },
            ToolInfo {
                name: "rag_retrieve".to_string(),
                description: "Expand a question into paraphrases, search each and merge".to_string(),
            },
            ToolInfo {
                name: "rag_expand".to_string(),
                description: "Generate paraphrases of a query".to_string(),
            },
            ToolInfo {
                name: "rag_ask".to_string(),
                description: "Answer a question grounded on retrieved chunks".to_string(),
            },
            ToolInfo {
                name: "rag_stats".to_string(),
                description: "Get statistics about the corpus".to_string(),
            },
        ]
    }

    /// Dispatch a tool call by name with JSON arguments.
    pub async fn call(&self, tool: &str, arguments: Value) -> ToolResult {
        match tool {
            "rag_search" => match parse(arguments) {
                Ok(params) => self.search(params).await,
                Err(result) => result,
            },
            "rag_retrieve" => match parse(arguments) {
                Ok(params) => self.retrieve(params).await,
                Err(result) => result,
            },
            "rag_expand" => match parse(arguments) {
                Ok(params) => self.expand(params).await,
                Err(result) => result,
            },
            "rag_ask" => match parse(arguments) {
                Ok(params) => self.ask(params).await,
                Err(result) => result,
            },
            "rag_stats" => self.stats(),
            _ => ToolResult::error(
                "Call failed",
                &RagError::invalid_argument(format!("unknown tool '{}'", tool)),
            ),
        }
    }

    /// Search the corpus.
    pub async fn search(&self, params: SearchParams) -> ToolResult {
        info!("Searching for: {:?}", params.query);

        match self.run_search(&params).await {
            Ok(result) => ToolResult::with_data(self.format_results(&result), &result),
            Err(e) => ToolResult::error("Search failed", &e),
        }
    }

    /// Multi-query retrieval.
    pub async fn retrieve(&self, params: RetrieveParams) -> ToolResult {
        info!("Retrieving for: {:?}", params.query);

        match self.run_retrieve(&params).await {
            Ok(result) => ToolResult::with_data(self.format_results(&result), &result),
            Err(e) => ToolResult::error("Retrieval failed", &e),
        }
    }

    /// Paraphrase a query.
    pub async fn expand(&self, params: ExpandParams) -> ToolResult {
        let n = params.n.unwrap_or(self.config.expansion.n_expansions);

        match self.expander.expand(&params.query, n).await {
            Ok(variants) => {
                let mut output = format!("Generated {} variants:\n\n", variants.len());
                for (i, variant) in variants.iter().enumerate() {
                    output.push_str(&format!("{}. {}\n", i + 1, variant));
                }
                ToolResult::success(output, json!({ "query": params.query, "variants": variants }))
            }
            Err(e) => ToolResult::error("Expansion failed", &e),
        }
    }

    /// Answer a question from retrieved context.
    pub async fn ask(&self, params: AskParams) -> ToolResult {
        info!("Answering: {:?}", params.query);

        let n_expansions = params.n_expansions.unwrap_or(0);
        let retrieved = if n_expansions > 0 {
            self.run_retrieve(&RetrieveParams {
                query: params.query.clone(),
                top_k: params.top_k,
                mode: params.mode,
                n_expansions: Some(n_expansions),
                ..Default::default()
            })
            .await
        } else {
            self.run_search(&SearchParams {
                query: params.query.clone(),
                top_k: params.top_k,
                mode: params.mode,
                alpha: None,
            })
            .await
        };

        let retrieved = match retrieved {
            Ok(result) => result,
            Err(e) => return ToolResult::error("Retrieval failed", &e),
        };

        let mut synthesis = self.config.synthesis.clone();
        if let Some(limit) = params.context_budget {
            synthesis.context_budget = limit;
        }
        if let Some(unit) = params.budget_unit {
            synthesis.budget_unit = unit;
        }

        match self
            .synthesizer
            .synthesize(&params.query, &retrieved, synthesis.budget())
            .await
        {
            Ok(answer) => {
                let mut output = answer.text.clone();
                if !answer.citations.is_empty() {
                    output.push_str(&format!("\n\nSources: {}", answer.citations.join(", ")));
                }
                ToolResult::with_data(output, &answer)
            }
            Err(e) => ToolResult::error("Answer failed", &e),
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> ToolResult {
        let stats = self.corpus.stats();

        let mut output = String::from("Corpus statistics:\n\n");
        output.push_str(&format!("- Chunks: {}\n", stats.chunks));
        output.push_str(&format!("- Terms: {}\n", stats.terms));
        output.push_str(&format!("- Dimension: {}\n", stats.dimension));
        output.push_str(&format!("- Similarity: {}\n", stats.similarity));
        output.push_str(&format!("- Avg terms per chunk: {:.1}\n", stats.avg_chunk_terms));

        ToolResult::with_data(output, &stats)
    }

    /// Search settings from config, overridden by the request.
    fn query_config(
        &self,
        top_k: Option<usize>,
        mode: Option<SearchMode>,
        alpha: Option<f32>,
    ) -> QueryConfig {
        let search = &self.config.search;
        let mut config = QueryConfig::from_search_config(search);

        config.top_k = top_k.unwrap_or(search.default_top_k).min(search.max_top_k);
        if let Some(mode) = mode {
            config.mode = mode;
        }
        if let Some(alpha) = alpha {
            config.alpha = alpha;
        }
        config
    }

    async fn run_search(&self, params: &SearchParams) -> Result<RetrievalResult> {
        if params.query.trim().is_empty() {
            return Err(RagError::invalid_argument("query must not be empty"));
        }

        let config = self.query_config(params.top_k, params.mode, params.alpha);
        let vector = match config.mode {
            SearchMode::Keyword => Vec::new(),
            SearchMode::Semantic | SearchMode::Hybrid => {
                self.embedder.embed_query(&params.query).await?
            }
        };

        self.engine.search(&params.query, &vector, &config)
    }

    async fn run_retrieve(&self, params: &RetrieveParams) -> Result<RetrievalResult> {
        let mut config = MultiQueryConfig::from_config(&self.config);
        config.query = self.query_config(params.top_k, params.mode, None);
        if let Some(n) = params.n_expansions {
            config.n_expansions = n;
        }
        if let Some(include_original) = params.include_original {
            config.include_original = include_original;
        }
        if params.max_results.is_some() {
            config.max_results = params.max_results;
        }

        self.retriever.retrieve(&params.query, &config).await
    }

    fn format_results(&self, result: &RetrievalResult) -> String {
        let mut output = format!("Found {} results:\n\n", result.len());

        for scored in result.iter() {
            let Some(chunk) = self.corpus.get(&scored.chunk_id) else {
                continue;
            };
            output.push_str(&format!(
                "---\n[{}] {} {} (score: {:.3})\n",
                scored.rank, scored.chunk_id, chunk.source_uri, scored.score
            ));
            output.push_str(&format!("{}\n\n", chunk.text));
        }

        output
    }
}

fn parse<T: DeserializeOwned>(arguments: Value) -> std::result::Result<T, ToolResult> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolResult::error("Invalid parameters", &RagError::from(e)))
}

/// Server info.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Tool info.
#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}
