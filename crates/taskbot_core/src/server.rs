//! HTTP surface for chat clients and tool-calling runtimes.

use crate::dialogue::{DialogueEngine, StructuredAction};
use crate::error::AppError;
use crate::model::Intent;
use crate::tools::ToolAdapter;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    engine: Arc<DialogueEngine>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response_text: String,
    pub detected_intent: Intent,
    pub structured_action: Option<StructuredAction>,
    pub session_id: String,
}

pub fn router(engine: Arc<DialogueEngine>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(call_tool))
        .with_state(AppState { engine })
}

/// Serves until `shutdown` resolves, sweeping idle sessions every
/// `sweep_every` in the background.
pub async fn serve<F>(
    listener: TcpListener,
    engine: Arc<DialogueEngine>,
    sweep_every: Duration,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweeper = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(sweep_every);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                if let Err(err) = engine.evict_idle().await {
                    warn!(code = err.code(), "idle session sweep failed");
                }
            }
        })
    };

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, mode = engine.create_mode().as_str(), "listening");
    }
    let result = axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| AppError::io(format!("server error: {err}")));
    sweeper.abort();
    result
}

pub fn sweep_interval(idle_timeout: Duration) -> Duration {
    (idle_timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn service_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "taskbot",
        "version": env!("CARGO_PKG_VERSION"),
        "create_task_mode": state.engine.create_mode().as_str(),
        "endpoints": ["/health", "/api/chat", "/api/tools", "/api/tools/{name}"],
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "user_id is required");
    }

    let token = request
        .auth_token
        .filter(|token| !token.trim().is_empty())
        .or_else(|| bearer_token(&headers))
        .unwrap_or_default();

    let reply = state
        .engine
        .handle_in_session(
            user_id,
            request.session_id.as_deref(),
            &request.message,
            &token,
        )
        .await;

    Json(ChatResponse {
        response_text: reply.text,
        detected_intent: reply.intent,
        structured_action: reply.action,
        session_id: reply.session_id,
    })
    .into_response()
}

async fn list_tools() -> Json<Value> {
    Json(json!({ "tools": ToolAdapter::definitions() }))
}

async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !ToolAdapter::definitions()
        .iter()
        .any(|definition| definition.name == name)
    {
        return detail(StatusCode::NOT_FOUND, &format!("unknown tool '{name}'"));
    }

    let arguments = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(err) => {
                return detail(
                    StatusCode::BAD_REQUEST,
                    &format!("arguments must be a JSON object: {err}"),
                );
            }
        }
    };
    let token = bearer_token(&headers).unwrap_or_default();
    let result = state.engine.tools().invoke(&name, &arguments, &token).await;
    Json(json!({ "result": result })).into_response()
}
