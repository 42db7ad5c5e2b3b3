//! WebSocket connection handling: the pre-handshake auth gate, the
//! request/response loop, and fan-out of push events onto the socket
//! (§4.1).

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;
use crate::transport::auth::{origin_allowed, tokens_match};
use crate::transport::rpc::{parse_request, RpcResponse};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !origin_allowed(origin.as_deref()) {
        return axum::http::StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
struct AuthFrame {
    token: String,
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // First frame must be the auth frame; anything else closes the
    // connection without a response (the client never proved it holds
    // the token, so it doesn't get one either).
    let Some(Ok(WsMessage::Text(raw))) = socket.recv().await else {
        let _ = socket.close().await;
        return;
    };

    let authed = serde_json::from_str::<AuthFrame>(&raw)
        .map(|frame| tokens_match(&state.auth_token, &frame.token))
        .unwrap_or(false);

    if !authed {
        let _ = socket
            .send(WsMessage::Text(
                json!({"type": "auth", "ok": false, "error": "invalid token"}).to_string(),
            ))
            .await;
        let _ = socket
            .send(WsMessage::Close(Some(CloseFrame {
                code: 4401,
                reason: "invalid token".into(),
            })))
            .await;
        return;
    }
    let _ = socket
        .send(WsMessage::Text(json!({"type": "auth", "ok": true}).to_string()))
        .await;

    let mut push_rx = state.push.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Text(raw))) => {
                        let response = handle_request(&state, &raw).await;
                        if socket.send(WsMessage::Text(response)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ignore binary/ping/pong frames
                    Some(Err(_)) => break,
                }
            }
            event = push_rx.recv() => {
                match event {
                    Ok(event) => {
                        let text = serde_json::to_string(&event).unwrap_or_default();
                        if socket.send(WsMessage::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

async fn handle_request(state: &Arc<AppState>, raw: &str) -> String {
    let request = match parse_request(raw) {
        Ok(req) => req,
        Err(e) => {
            let response = RpcResponse::err(serde_json::Value::Null, &e);
            return serde_json::to_string(&response).unwrap_or_default();
        }
    };

    let response = match super::dispatch::dispatch(state, &request.method, request.params).await {
        Ok(result) => RpcResponse::ok(request.id, result),
        Err(e) => RpcResponse::err(request.id, &e),
    };
    serde_json::to_string(&response).unwrap_or_default()
}
