use anyhow::Result;
use axum::Router;
use clap::Parser;
use server::generation::ChatClient;
use server::{build_app, AppConfig};
use shelf_core::answer::AnswerGate;
use shelf_core::{Bm25Params, EngineConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Corpus file (.json/.jsonl) or directory
    #[arg(long)]
    corpus: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8088)]
    port: u16,
    /// BM25 term-frequency saturation
    #[arg(long, default_value_t = 1.5)]
    k1: f64,
    /// BM25 length normalization
    #[arg(long, default_value_t = 0.75)]
    b: f64,
    /// Default number of results per search
    #[arg(long, default_value_t = 20)]
    limit: usize,
    /// Minimum top score before an answer is generated
    #[arg(long, default_value_t = 0.5)]
    answer_threshold: f64,
    /// Append query and click events to this JSON-lines file
    #[arg(long)]
    analytics_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let chat = ChatClient::from_env();
    if chat.is_none() {
        tracing::info!("GROQ_API_KEY not set, answers disabled");
    }
    let config = AppConfig {
        engine: EngineConfig {
            params: Bm25Params { k1: args.k1, b: args.b },
            default_limit: args.limit,
            ..EngineConfig::default()
        },
        gate: AnswerGate { threshold: args.answer_threshold, ..AnswerGate::default() },
        analytics_log: args.analytics_log,
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
        chat,
        ..AppConfig::new(args.corpus)
    };
    let app: Router = build_app(config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
