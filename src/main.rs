//! Concierge - 多能力编排服务
//!
//! 入口：初始化日志、装配编排器，并启动 HTTP 服务。
//! POST /query 同时支持非流式 JSON 与 SSE 流式两种响应。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use concierge::agents::{
    AdapterRegistry, CalendarAdapter, MapsAdapter, ResearchAdapter, TelephoneAdapter,
};
use concierge::config::{load_config, AppConfig};
use concierge::llm::create_llm_from_config;
use concierge::run::{
    self, ExecutionHarness, IntentClassifier, RunEvent, Summarizer, Supervisor,
};

#[derive(Clone)]
struct AppState {
    supervisor: Arc<Supervisor>,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    stream: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    response: String,
    agent_outputs: BTreeMap<String, String>,
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = match load_config(None) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "config load failed, using defaults");
            AppConfig::default()
        }
    };

    let llm = create_llm_from_config(&cfg.llm);

    let mut adapters = AdapterRegistry::new();
    adapters.register(MapsAdapter::new(&cfg.maps).context("Failed to build maps adapter")?);
    adapters.register(CalendarAdapter::new().context("Failed to build calendar adapter")?);
    adapters.register(
        TelephoneAdapter::new(&cfg.telephony).context("Failed to build telephone adapter")?,
    );
    adapters.register(ResearchAdapter::new(llm.clone()));
    tracing::info!(capabilities = ?adapters.capabilities(), "adapters registered");

    let supervisor = Supervisor::new(
        IntentClassifier::new(llm.clone(), cfg.classifier.clone()),
        run::Router::new(cfg.classifier.reservation_keywords.clone()),
        ExecutionHarness::new(adapters, cfg.execution.capability_timeout_secs),
        Summarizer::new(llm),
    );
    let state = AppState {
        supervisor: Arc::new(supervisor),
    };

    let app = axum::Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/query", post(query))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "concierge server listening");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Concierge Orchestrator API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn query(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Response {
    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Query is required" })),
        )
            .into_response();
    }

    if req.stream {
        return stream_events(state.supervisor.clone(), req.query).into_response();
    }

    match state.supervisor.process(&req.query).await {
        Ok(outcome) => Json(QueryResponse {
            response: outcome.response,
            agent_outputs: outcome.outputs,
            message: "Query processed successfully".to_string(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "query processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Error processing query: {}", e) })),
            )
                .into_response()
        }
    }
}

/// SSE 流式处理。客户端断开即丢弃流，DropGuard 触发取消令牌，
/// 进行中的能力按取消记为失败并照常走到终态。
fn stream_events(
    supervisor: Arc<Supervisor>,
    query: String,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (tx, rx) = mpsc::unbounded_channel::<RunEvent>();
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    tokio::spawn(async move {
        supervisor.process_streamed(&query, tx, cancel).await;
    });

    let stream = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        Some((event, (rx, guard)))
    })
    .map(|event| Event::default().json_data(&event));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
