//! RAG CLI - Command-line interface for the hybrid retrieval engine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rag_core::{BudgetUnit, RagConfig, SearchMode};
use rag_generate::OllamaGenerator;
use rag_server::{AskParams, ExpandParams, RagServer, RetrieveParams, SearchParams, ToolResult};

/// RAG - Local hybrid search and multi-query retrieval
#[derive(Parser)]
#[command(name = "rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Corpus file, one JSON chunk record per line (overrides config)
    #[arg(short, long, global = true)]
    corpus: Option<PathBuf>,

    /// Config file (default: user config dir, then ./rag-hybrid.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the JSON result instead of the text summary
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the corpus with a single query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Search mode: semantic, keyword or hybrid
        #[arg(short, long)]
        mode: Option<SearchMode>,

        /// Semantic weight in hybrid mode (0.0 to 1.0)
        #[arg(short, long)]
        alpha: Option<f32>,
    },

    /// Expand a question into paraphrases, search each and merge
    Retrieve {
        /// Question
        query: String,

        /// Results per sub-query
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Number of paraphrases
        #[arg(short = 'n', long)]
        expansions: Option<usize>,

        /// Search only the paraphrases
        #[arg(long)]
        no_original: bool,

        /// Search mode: semantic, keyword or hybrid
        #[arg(short, long)]
        mode: Option<SearchMode>,

        /// Cap on the merged result
        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Generate paraphrases of a query
    Expand {
        /// Query to paraphrase
        query: String,

        /// Number of paraphrases
        #[arg(short = 'n', long)]
        expansions: Option<usize>,
    },

    /// Answer a question from retrieved chunks
    Ask {
        /// Question
        query: String,

        /// Results per query
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Context budget (characters, or tokens with --tokens)
        #[arg(short, long)]
        budget: Option<usize>,

        /// Measure the budget in estimated tokens
        #[arg(long)]
        tokens: bool,

        /// Paraphrases to search before answering (0 for a single search)
        #[arg(short = 'n', long, default_value = "0")]
        expansions: usize,
    },

    /// Show corpus statistics
    Stats,

    /// List the available tools
    Tools,
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(
    path: Option<PathBuf>,
    corpus: Option<PathBuf>,
) -> Result<RagConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => RagConfig::load(&path)?,
        None => RagConfig::load_default()?,
    };
    if let Some(corpus) = corpus {
        config.corpus_path = corpus;
    }
    debug!("Using corpus at {:?}", config.corpus_path);
    Ok(config)
}

async fn get_server(config: RagConfig) -> Result<RagServer, Box<dyn std::error::Error>> {
    if !config.corpus_path.exists() {
        eprintln!(
            "Corpus file {} does not exist. Specify one with --corpus.",
            config.corpus_path.display()
        );
        std::process::exit(1);
    }

    let generator = Arc::new(OllamaGenerator::new(&config.generation)?);
    Ok(RagServer::load(config, generator).await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let (config_path, corpus) = (cli.config, cli.corpus);

    let result = match cli.command {
        Commands::Search {
            query,
            top_k,
            mode,
            alpha,
        } => {
            let server = get_server(load_config(config_path, corpus)?).await?;
            server
                .search(SearchParams {
                    query,
                    top_k,
                    mode,
                    alpha,
                })
                .await
        }
        Commands::Retrieve {
            query,
            top_k,
            expansions,
            no_original,
            mode,
            max_results,
        } => {
            let server = get_server(load_config(config_path, corpus)?).await?;
            server
                .retrieve(RetrieveParams {
                    query,
                    top_k,
                    mode,
                    n_expansions: expansions,
                    include_original: no_original.then_some(false),
                    max_results,
                })
                .await
        }
        Commands::Expand { query, expansions } => {
            let server = get_server(load_config(config_path, corpus)?).await?;
            server
                .expand(ExpandParams {
                    query,
                    n: expansions,
                })
                .await
        }
        Commands::Ask {
            query,
            top_k,
            budget,
            tokens,
            expansions,
        } => {
            let server = get_server(load_config(config_path, corpus)?).await?;
            server
                .ask(AskParams {
                    query,
                    top_k,
                    mode: None,
                    n_expansions: Some(expansions),
                    context_budget: budget,
                    budget_unit: tokens.then_some(BudgetUnit::Tokens),
                })
                .await
        }
        Commands::Stats => {
            let server = get_server(load_config(config_path, corpus)?).await?;
            server.stats()
        }
        Commands::Tools => {
            for tool in RagServer::tools() {
                println!("{:<14} {}", tool.name, tool.description);
            }
            return Ok(());
        }
    };

    print_result(&result, cli.json)
}

fn print_result(result: &ToolResult, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !result.success {
        eprintln!("Error: {}", result.message);
        std::process::exit(1);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result.data)?);
    } else {
        println!("{}", result.message);
    }
    Ok(())
}
