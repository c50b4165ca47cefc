//! `GET /ws/downloads?token=<jwt>` — a push feed of download-update events.
//! Authenticated via a query-string token since browsers can't set headers
//! on the WebSocket handshake.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::middleware::auth::token_from_query;
use crate::AppState;

pub async fn downloads_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let query = query.ok_or(AppError::TokenRequired)?;
    let token = token_from_query(&query).ok_or(AppError::TokenRequired)?;
    let claims = state.auth.verify_token(token)?;
    let user = state.auth.user_from_claims(&claims).await?;

    let receiver = state.fanout.register();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, receiver, user.id)))
}

async fn handle_socket(
    mut socket: WebSocket,
    mut receiver: tokio::sync::mpsc::UnboundedReceiver<String>,
    user_id: uuid::Uuid,
) {
    tracing::debug!(user_id = %user_id, "websocket download feed opened");
    while let Some(payload) = receiver.recv().await {
        if socket.send(Message::Text(payload)).await.is_err() {
            break;
        }
    }
    tracing::debug!(user_id = %user_id, "websocket download feed closed");
}
