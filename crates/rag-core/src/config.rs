//! Configuration types for the retrieval engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RagError, Result};
use crate::types::{ContextBudget, FusionMethod, SearchMode, Similarity};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Path to the JSONL corpus file.
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,

    /// Index configuration.
    #[serde(default)]
    pub index: IndexConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Multi-query expansion configuration.
    #[serde(default)]
    pub expansion: ExpansionConfig,

    /// Generation collaborator configuration.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Answer synthesis configuration.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            expansion: ExpansionConfig::default(),
            generation: GenerationConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

/// Keyword and vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Embedding dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Vector similarity function.
    #[serde(default)]
    pub similarity: Similarity,

    /// BM25 term-frequency saturation.
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f32,

    /// BM25 length normalization.
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f32,

    /// Batch size for embedding during ingestion.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            similarity: Similarity::Cosine,
            bm25_k1: 1.2,
            bm25_b: 0.75,
            batch_size: 32,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Maximum number of results.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Default search mode.
    #[serde(default)]
    pub mode: SearchMode,

    /// Hybrid search alpha (0 = keyword only, 1 = vector only).
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,

    /// Fusion rule for hybrid mode.
    #[serde(default)]
    pub fusion: FusionMethod,

    /// RRF constant k.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Hybrid candidate pool is `top_k * candidate_multiplier`...
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// ...but never smaller than this.
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            max_top_k: 100,
            mode: SearchMode::Hybrid,
            hybrid_alpha: 0.5,
            fusion: FusionMethod::Weighted,
            rrf_k: 60,
            candidate_multiplier: 2,
            min_candidates: 20,
        }
    }
}

/// Multi-query expansion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Number of paraphrases to generate.
    #[serde(default = "default_n_expansions")]
    pub n_expansions: usize,

    /// Search the original query alongside its paraphrases.
    #[serde(default = "default_true")]
    pub include_original: bool,

    /// Cap on the merged result (unbounded when unset).
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            n_expansions: 3,
            include_original: true,
            max_results: None,
        }
    }
}

/// Generation collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Ollama-compatible API endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for expansion and synthesis.
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient transport failures (0 disables).
    #[serde(default)]
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds (doubles each retry).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 60,
            max_retries: 0,
            initial_backoff_ms: 200,
        }
    }
}

/// Unit of the synthesis context budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetUnit {
    #[default]
    Characters,
    Tokens,
}

/// Answer synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Context budget limit.
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    /// Unit the limit is measured in.
    #[serde(default)]
    pub budget_unit: BudgetUnit,
}

impl SynthesisConfig {
    /// The configured budget as a [`ContextBudget`].
    pub fn budget(&self) -> ContextBudget {
        match self.budget_unit {
            BudgetUnit::Characters => ContextBudget::Characters(self.context_budget),
            BudgetUnit::Tokens => ContextBudget::Tokens(self.context_budget),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            context_budget: 4000,
            budget_unit: BudgetUnit::Characters,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_dimension() -> usize {
    384
}

fn default_bm25_k1() -> f32 {
    1.2
}

fn default_bm25_b() -> f32 {
    0.75
}

fn default_batch_size() -> usize {
    32
}

fn default_top_k() -> usize {
    10
}

fn default_max_top_k() -> usize {
    100
}

fn default_hybrid_alpha() -> f32 {
    0.5
}

fn default_rrf_k() -> u32 {
    60
}

fn default_candidate_multiplier() -> usize {
    2
}

fn default_min_candidates() -> usize {
    20
}

fn default_n_expansions() -> usize {
    3
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_context_budget() -> usize {
    4000
}

fn default_corpus_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rag-hybrid")
        .join("chunks.jsonl")
}

impl RagConfig {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rag-hybrid").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("rag-hybrid.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.index.dimension == 0 {
            return Err(RagError::config("index.dimension must be positive"));
        }
        if self.index.batch_size == 0 {
            return Err(RagError::config("index.batch_size must be positive"));
        }
        if self.index.bm25_k1 < 0.0 || !(0.0..=1.0).contains(&self.index.bm25_b) {
            return Err(RagError::config(
                "index.bm25_k1 must be >= 0 and index.bm25_b within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.search.hybrid_alpha) {
            return Err(RagError::config(format!(
                "search.hybrid_alpha must be within [0, 1], got {}",
                self.search.hybrid_alpha
            )));
        }
        if self.search.default_top_k == 0 || self.search.default_top_k > self.search.max_top_k {
            return Err(RagError::config(
                "search.default_top_k must be between 1 and search.max_top_k",
            ));
        }
        if self.search.candidate_multiplier == 0 {
            return Err(RagError::config("search.candidate_multiplier must be positive"));
        }
        if !self.generation.temperature.is_finite() || self.generation.temperature < 0.0 {
            return Err(RagError::config(
                "generation.temperature must be a non-negative number",
            ));
        }
        if self.generation.timeout_secs == 0 {
            return Err(RagError::config("generation.timeout_secs must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.search.default_top_k, 10);
        assert_eq!(config.search.mode, SearchMode::Hybrid);
        assert_eq!(config.search.hybrid_alpha, 0.5);
        assert_eq!(config.generation.temperature, 0.0);
        assert!(config.expansion.include_original);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_synthesis_budget() {
        let mut config = SynthesisConfig::default();
        assert_eq!(config.budget(), ContextBudget::Characters(4000));
        config.budget_unit = BudgetUnit::Tokens;
        config.context_budget = 512;
        assert_eq!(config.budget(), ContextBudget::Tokens(512));
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
corpus_path = "/tmp/chunks.jsonl"

[search]
hybrid_alpha = 0.3
mode = "keyword"

[generation]
model = "qwen2.5"
"#
        )
        .unwrap();

        let config = RagConfig::load(file.path()).unwrap();
        assert_eq!(config.corpus_path, PathBuf::from("/tmp/chunks.jsonl"));
        assert_eq!(config.search.hybrid_alpha, 0.3);
        assert_eq!(config.search.mode, SearchMode::Keyword);
        assert_eq!(config.search.default_top_k, 10);
        assert_eq!(config.generation.model, "qwen2.5");
        assert_eq!(config.index.dimension, 384);
    }

    #[test]
    fn test_validate_rejects_bad_alpha() {
        let mut config = RagConfig::default();
        config.search.hybrid_alpha = 1.5;
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search\nhybrid_alpha = ").unwrap();
        assert!(matches!(
            RagConfig::load(file.path()),
            Err(RagError::Config { .. })
        ));
    }
}
