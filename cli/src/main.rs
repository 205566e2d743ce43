use anyhow::Result;
use clap::{Parser, Subcommand};
use shelf_core::corpus::load_corpus;
use shelf_core::{Bm25Params, EngineConfig, SearchEngine};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Query a product corpus with BM25 ranking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the corpus against a query and print the results
    Search {
        /// Corpus file (.json/.jsonl) or directory
        #[arg(long)]
        corpus: PathBuf,
        /// Maximum number of results
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Opaque id embedded in result links
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long, default_value_t = 1.5)]
        k1: f64,
        #[arg(long, default_value_t = 0.75)]
        b: f64,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        query: Vec<String>,
    },
    /// Build the index and print its statistics
    Stats {
        #[arg(long)]
        corpus: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { corpus, limit, context, k1, b, json, query } => {
            let corpus = load_corpus(&corpus)?;
            let engine = SearchEngine::new(EngineConfig { params: Bm25Params { k1, b }, ..EngineConfig::default() });
            let query = query.join(" ");
            let results = engine.search_with_limit(&query, &context, &corpus, limit)?;
            tracing::info!(query = %query, documents = corpus.len(), hits = results.len(), "search complete");
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("no results");
            } else {
                for (rank, r) in results.iter().enumerate() {
                    println!("{:>3}. {:>8.4}  {}  {}", rank + 1, r.ranking, r.pid, r.title);
                }
            }
        }
        Commands::Stats { corpus } => {
            let corpus = load_corpus(&corpus)?;
            let engine = SearchEngine::default();
            let stats = engine.rebuild(&corpus)?;
            tracing::info!(num_docs = stats.index.num_docs, num_terms = stats.index.num_terms, "index built");
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
