//! HTTP ingress in front of a [`LocalRuntime`].
//!
//! Invocation paths are `/{Service}/{handler}` and `/{Object}/{key}/{handler}`,
//! with a trailing `/send` for one-way calls. Runtime operations live under
//! `/restate/...`.

use crate::core::{LocalRuntime, Target};
use crate::utils::error::{DurableError, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Error body returned by every failing ingress request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub invocation_id: String,
}

impl IntoResponse for DurableError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code >= 500 {
            tracing::error!("❌ Invocation failed: {}", self);
        } else {
            tracing::debug!(code, "Invocation rejected: {}", self);
        }
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(runtime: LocalRuntime) -> Router {
    // 同一層的路徑參數必須同名，所以用 first/second 代替 key/handler
    Router::new()
        .route("/health", get(health))
        .route("/discover", get(discover))
        .route("/restate/awakeables/:id/resolve", post(resolve_awakeable))
        .route("/restate/awakeables/:id/reject", post(reject_awakeable))
        .route("/restate/workflow/:service/:key/attach", get(attach_workflow))
        .route("/restate/workflow/:service/:key/output", get(workflow_output))
        .route("/restate/state/:service/:key", get(state_snapshot))
        .route("/:service/:first", post(call_service))
        .route("/:service/:first/send", post(send_service))
        .route("/:service/:first/:second", post(call_object))
        .route("/:service/:first/:second/send", post(send_object))
        .layer(TraceLayer::new_for_http())
        .with_state(runtime)
}

/// Serves the ingress until Ctrl-C.
pub async fn serve(runtime: LocalRuntime, addr: SocketAddr) -> Result<()> {
    let app = router(runtime);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🚀 Ingress listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Ingress stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// 空的 body 代表 `null`
fn parse_body(body: &Bytes) -> Result<Value> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(body)?)
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn invoke(
    runtime: &LocalRuntime,
    target: Target,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Json<Value>> {
    let input = parse_body(body)?;
    let output = match idempotency_key(headers) {
        Some(key) => runtime.invoke_idempotent(target, input, &key).await?,
        None => runtime.invoke(target, input).await?,
    };
    Ok(Json(output))
}

fn send(runtime: &LocalRuntime, target: Target, body: &Bytes) -> Result<(StatusCode, Json<SendResponse>)> {
    let input = parse_body(body)?;
    // 先檢查 target，不然 202 之後才失敗呼叫端看不到
    runtime.validate_target(&target)?;
    let invocation_id = runtime.send(target, input, None);
    Ok((StatusCode::ACCEPTED, Json(SendResponse { invocation_id })))
}

async fn call_service(
    State(runtime): State<LocalRuntime>,
    Path((service, handler)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    invoke(&runtime, Target::service(service, handler), &headers, &body).await
}

async fn call_object(
    State(runtime): State<LocalRuntime>,
    Path((service, key, handler)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    invoke(&runtime, Target::object(service, key, handler), &headers, &body).await
}

async fn send_service(
    State(runtime): State<LocalRuntime>,
    Path((service, handler)): Path<(String, String)>,
    body: Bytes,
) -> Result<(StatusCode, Json<SendResponse>)> {
    send(&runtime, Target::service(service, handler), &body)
}

async fn send_object(
    State(runtime): State<LocalRuntime>,
    Path((service, key, handler)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<(StatusCode, Json<SendResponse>)> {
    send(&runtime, Target::object(service, key, handler), &body)
}

async fn resolve_awakeable(
    State(runtime): State<LocalRuntime>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode> {
    runtime.resolve_awakeable(&id, parse_body(&body)?)?;
    Ok(StatusCode::ACCEPTED)
}

async fn reject_awakeable(
    State(runtime): State<LocalRuntime>,
    Path(id): Path<String>,
    reason: String,
) -> Result<StatusCode> {
    runtime.reject_awakeable(&id, reason)?;
    Ok(StatusCode::ACCEPTED)
}

async fn attach_workflow(
    State(runtime): State<LocalRuntime>,
    Path((service, key)): Path<(String, String)>,
) -> Result<Json<Value>> {
    Ok(Json(runtime.attach_workflow(&service, &key).await?))
}

async fn workflow_output(
    State(runtime): State<LocalRuntime>,
    Path((service, key)): Path<(String, String)>,
) -> Result<Json<Value>> {
    Ok(Json(runtime.workflow_output(&service, &key)?))
}

async fn state_snapshot(
    State(runtime): State<LocalRuntime>,
    Path((service, key)): Path<(String, String)>,
) -> Json<HashMap<String, Value>> {
    Json(runtime.state_snapshot(&service, &key))
}

async fn discover(State(runtime): State<LocalRuntime>) -> impl IntoResponse {
    Json(runtime.endpoint().manifest())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
