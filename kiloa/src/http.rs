//! HTTP surface: agent ingestion plus read-only fleet queries.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use flate2::read::GzDecoder;
use serde_json::json;
use std::future::Future;
use std::io::Read;
use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::state::AppState;
use crate::types::NodeReport;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/report", post(report))
        .route("/api/nodes", get(nodes))
        .route("/api/node/:id", get(node))
        .route("/api/node/:id/history", get(history))
        .route("/api/snapshot", get(snapshot))
        .route("/api/stats", get(stats))
        .with_state(state)
}

pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "error": msg.into() }))).into_response()
}

/// Accepts the raw token or `Bearer <token>`.
fn authorized(headers: &HeaderMap, token: &str) -> bool {
    let Some(v) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let v = v.trim();
    v == token || v.strip_prefix("Bearer ").map(str::trim) == Some(token)
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"))
}

fn decode_body(headers: &HeaderMap, body: &Bytes) -> Result<NodeReport, String> {
    if is_gzip(headers) {
        let mut raw = Vec::new();
        GzDecoder::new(body.as_ref())
            .read_to_end(&mut raw)
            .map_err(|e| format!("bad gzip body: {e}"))?;
        serde_json::from_slice(&raw).map_err(|e| format!("bad report: {e}"))
    } else {
        serde_json::from_slice(body).map_err(|e| format!("bad report: {e}"))
    }
}

async fn report(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let observed_at = Utc::now();
    if !authorized(&headers, &state.config.token) {
        return error(StatusCode::UNAUTHORIZED, "unauthorized");
    }
    let report = match decode_body(&headers, &body) {
        Ok(r) => r,
        Err(msg) => {
            debug!(%msg, "rejecting report");
            return error(StatusCode::BAD_REQUEST, msg);
        }
    };
    let node_id = report.node_id.clone();
    match state.ingest(report, observed_at).await {
        Ok(outcome) => Json(json!({ "status": "ok", "outcome": outcome })).into_response(),
        Err(e) => {
            warn!(node = %node_id, error = %e, "report rejected");
            error(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn nodes(State(state): State<AppState>) -> Response {
    Json(state.nodes(Utc::now()).await).into_response()
}

async fn node(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.node(&id, Utc::now()).await {
        Some(view) => Json(view).into_response(),
        None => error(StatusCode::NOT_FOUND, "node not found"),
    }
}

async fn history(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.history(&id, Utc::now()).await {
        Some(points) => Json(points).into_response(),
        None => error(StatusCode::NOT_FOUND, "node not found"),
    }
}

async fn snapshot(State(state): State<AppState>) -> Response {
    Json(state.snapshot(Utc::now()).await).into_response()
}

async fn stats(State(state): State<AppState>) -> Response {
    Json(state.store.counters()).into_response()
}
