//! The gateway's network surface: a loopback-only HTTP listener serving
//! an unauthenticated `GET /health` and a WebSocket upgrade that carries
//! the JSON-RPC transport (§4.1/§6).

pub mod auth;
pub mod dispatch;
pub mod rpc;
pub mod ws;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router(state: Arc<AppState>, start: Instant) -> Router {
    Router::new()
        .route("/health", get(move || health(start)))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

async fn health(start: Instant) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime": start.elapsed().as_secs(),
    }))
}
