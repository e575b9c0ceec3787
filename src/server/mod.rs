//! Axum intake server.
//!
//! One job: validate the request, mint a correlation id, and hand the work
//! to a spawned orchestration task. The HTTP response never waits on
//! routing or execution; results arrive over the notification webhook.

use crate::orchestrator::{Orchestrator, TaskRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum intake body size (64KB).
pub const MAX_BODY_SIZE: usize = 65_536;
/// Intake request timeout. Covers acceptance only, never execution.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct TaskBody {
    pub task: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

pub async fn run(host: &str, port: u16, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_with_listener(listener, orchestrator).await
}

/// Run from a pre-bound listener. Integration tests bind port 0 and pass
/// the listener in.
pub async fn run_with_listener(
    listener: tokio::net::TcpListener,
    orchestrator: Arc<Orchestrator>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "intake server listening");

    let app = build_router(AppState { orchestrator });
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handle_health))
        .route("/v1/tasks", post(handle_task))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .with_state(state)
}

async fn handle_health() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

/// Accept a task and acknowledge immediately with its correlation id.
async fn handle_task(State(state): State<AppState>, Json(body): Json<TaskBody>) -> Response {
    let description = body.task.trim().to_string();
    if description.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "task must not be empty"})),
        )
            .into_response();
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let request = TaskRequest {
        request_id: request_id.clone(),
        description,
        metadata: sanitize_metadata(body.metadata, &request_id),
    };

    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.orchestrate(request).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "request_id": request_id,
            "message": "task accepted; result will be delivered via notification",
        })),
    )
        .into_response()
}

/// Metadata must be a JSON object. Anything else is dropped with a warning,
/// never an intake error.
fn sanitize_metadata(
    metadata: Option<Value>,
    request_id: &str,
) -> Option<serde_json::Map<String, Value>> {
    match metadata {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            tracing::warn!(
                request_id,
                "dropping non-object request metadata: {}",
                crate::util::preview(&other.to_string(), 80)
            );
            None
        }
    }
}
