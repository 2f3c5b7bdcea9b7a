//! PlanSolve HTTP 服务
//!
//! 启动: cargo run --bin plansolve-web --features web
//! 端口默认 8080，可用 PLANSOLVE_WEB_PORT 覆盖。

#![cfg(feature = "web")]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower::ServiceBuilder;

use plansolve::config::load_config;
use plansolve::core::Status;
use plansolve::observability;
use plansolve::solver::SolverEvent;
use plansolve::Runtime;

/// 请求体上限（附件只传路径 / URL）
const MAX_BODY_BYTES: usize = 256 * 1024;

struct AppState {
    runtime: Runtime,
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    attachments: Vec<String>,
}

#[derive(Deserialize)]
struct SolveRequest {
    objective: String,
}

#[derive(Serialize)]
struct QueryResponse {
    status: Status,
    output: String,
}

#[derive(Serialize)]
struct SolveResponse {
    status: Status,
    output: String,
    events: Vec<SolverEvent>,
}

#[derive(Serialize)]
struct CapabilityInfo {
    name: String,
    description: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::var("PLANSOLVE_CONFIG").ok().map(PathBuf::from);
    let cfg = load_config(config_path)?;
    let runtime = Runtime::from_config(&cfg)?;
    let state = Arc::new(AppState { runtime });

    let app = Router::new()
        .route("/api/query", post(api_query))
        .route("/api/solve", post(api_solve))
        .route("/api/capabilities", get(api_capabilities))
        .route("/api/health", get(|| async { "OK" }))
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(MAX_BODY_BYTES)))
        .with_state(state);

    let port = std::env::var("PLANSOLVE_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("PlanSolve HTTP: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn api_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query is required".to_string()));
    }
    let outcome = state.runtime.handle(query, &req.attachments).await;
    Ok(Json(QueryResponse {
        status: outcome.status,
        output: outcome.output,
    }))
}

/// 规划循环：同时返回过程事件
async fn api_solve(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SolveRequest>,
) -> Result<Json<SolveResponse>, (StatusCode, String)> {
    let objective = req.objective.trim();
    if objective.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "objective is required".to_string()));
    }
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = state.runtime.solve_with_events(objective, Some(&tx)).await;
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    Ok(Json(SolveResponse {
        status: outcome.status,
        output: outcome.output,
        events,
    }))
}

async fn api_capabilities(State(state): State<Arc<AppState>>) -> Json<Vec<CapabilityInfo>> {
    let list = state
        .runtime
        .capabilities()
        .into_iter()
        .map(|(name, description)| CapabilityInfo { name, description })
        .collect();
    Json(list)
}
