pub mod generation;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use generation::ChatClient;
use serde::{Deserialize, Serialize};
use shelf_core::analytics::{Analytics, DocumentClicks, Metrics, QueryRecord};
use shelf_core::answer::AnswerGate;
use shelf_core::corpus::load_corpus;
use shelf_core::engine::EngineStats;
use shelf_core::{Corpus, Document, EngineConfig, ResultItem, SearchEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

pub struct AppConfig {
    pub corpus_path: PathBuf,
    pub engine: EngineConfig,
    pub gate: AnswerGate,
    pub analytics_log: Option<PathBuf>,
    pub admin_token: Option<String>,
    pub chat: Option<ChatClient>,
}

impl AppConfig {
    pub fn new(corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            corpus_path: corpus_path.into(),
            engine: EngineConfig::default(),
            gate: AnswerGate::default(),
            analytics_log: None,
            admin_token: None,
            chat: None,
        }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub search_id: Option<u64>,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<ResultItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Deserialize)]
pub struct DocParams {
    pub pid: String,
    #[serde(default)]
    pub search_id: Option<String>,
}

#[derive(Serialize)]
pub struct ClickedDocument {
    #[serde(flatten)]
    pub clicks: DocumentClicks,
    pub title: String,
    pub description: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub metrics: Metrics,
    pub document_clicks: Vec<ClickedDocument>,
    pub query_log: Vec<QueryRecord>,
    pub index: Option<EngineStats>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub corpus: Arc<Corpus>,
    pub analytics: Arc<Analytics>,
    pub gate: AnswerGate,
    pub chat: Option<ChatClient>,
    pub admin_token: Option<String>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

pub fn build_app(config: AppConfig) -> Result<Router> {
    // The engine builds its index lazily on the first search
    let corpus = load_corpus(&config.corpus_path)?;
    let analytics = match &config.analytics_log {
        Some(path) => Analytics::with_log(path)?,
        None => Analytics::new(),
    };
    let state = AppState {
        engine: Arc::new(SearchEngine::new(config.engine)),
        corpus: Arc::new(corpus),
        analytics: Arc::new(analytics),
        gate: config.gate,
        chat: config.chat,
        admin_token: config.admin_token,
    };
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc_details", get(doc_handler))
        .route("/stats", get(stats_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let query = params.q.trim().to_string();
    if query.is_empty() {
        return Ok(Json(SearchResponse {
            query,
            search_id: None,
            took_s: start.elapsed().as_secs_f64(),
            total_hits: 0,
            results: vec![],
            answer: None,
        }));
    }

    let search_id = {
        let (analytics, q) = (state.analytics.clone(), query.clone());
        blocking(move || analytics.record_query(&q)).await?
    };
    let k = params.k.unwrap_or(state.engine.config().default_limit).clamp(1, MAX_K);

    // the first search may block on the index build
    let (engine, corpus, q) = (state.engine.clone(), state.corpus.clone(), query.clone());
    let results = blocking(move || engine.search_with_limit(&q, &search_id.to_string(), &corpus, k))
        .await?
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let answer = match &state.chat {
        Some(client) => Some(generation::answer(&state.gate, client, &query, &results).await),
        None => None,
    };

    let took_s = start.elapsed().as_secs_f64();
    tracing::info!(query = %query, search_id, hits = results.len(), took_s, "search");
    Ok(Json(SearchResponse { query, search_id: Some(search_id), took_s, total_hits: results.len(), results, answer }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Query(params): Query<DocParams>,
) -> Result<Json<Document>, ApiError> {
    let Some(doc) = state.corpus.get(&params.pid) else {
        return Err(api_error(StatusCode::NOT_FOUND, "not found"));
    };
    let (analytics, pid) = (state.analytics.clone(), params.pid.clone());
    blocking(move || analytics.record_click(&pid)).await?;
    tracing::debug!(pid = %params.pid, search_id = ?params.search_id, "document click");
    Ok(Json(doc.clone()))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let document_clicks = state
        .analytics
        .document_clicks()
        .into_iter()
        .filter_map(|clicks| {
            let doc = state.corpus.get(&clicks.pid)?;
            Some(ClickedDocument { title: doc.title.clone(), description: doc.description.clone(), clicks })
        })
        .collect();
    Json(StatsResponse {
        metrics: state.analytics.metrics(),
        document_clicks,
        query_log: state.analytics.query_log(),
        index: state.engine.stats(),
    })
}

async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<EngineStats>, ApiError> {
    authorize(&state, &headers)?;
    let (engine, corpus) = (state.engine.clone(), state.corpus.clone());
    let stats = blocking(move || engine.rebuild(&corpus))
        .await?
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tracing::info!(num_docs = stats.index.num_docs, builds = stats.builds, "index rebuilt");
    Ok(Json(stats))
}

/// Run `f` on the blocking pool. Index builds and analytics log writes block.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(api_error(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}
