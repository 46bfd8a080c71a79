//! Notification websocket
//!
//! `GET /ws?token=...` streams the connection's notifications as JSON text
//! frames. Clients don't send commands; any frame they send only counts as
//! activity for the idle reaper.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiError;
use crate::state::connection::Connection;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let token = params.token.as_deref().ok_or(ApiError::Unauthorized)?;
    let conn = state
        .authenticate(token)
        .await
        .ok_or(ApiError::Unauthorized)?;

    tracing::info!("WebSocket connection request from {}", conn.id());
    let ping_interval = state.config.ping_interval;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, conn, ping_interval)))
}

async fn handle_socket(socket: WebSocket, conn: Arc<Connection>, ping_interval: Duration) {
    let Some(mut notifications) = conn.subscribe().await else {
        tracing::debug!("Connection of {} closed before websocket opened", conn.id());
        return;
    };
    let (mut sender, mut receiver) = socket.split();

    let mut ping = tokio::time::interval(ping_interval);
    // first tick completes immediately
    ping.tick().await;

    loop {
        tokio::select! {
            msg = notifications.recv() => {
                match msg {
                    Ok(msg) => {
                        let json = match serde_json::to_string(&msg) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!("Failed to serialize notification: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("WebSocket of {} lagged, skipped {} notifications", conn.id(), skipped);
                    }
                    Err(RecvError::Closed) => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            _ = ping.tick() => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => conn.touch(),
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error for {}: {}", conn.id(), e);
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("WebSocket connection closed for {}", conn.id());
}
