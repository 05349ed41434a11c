//! WebSocket endpoint for real-time chat.
//!
//! `GET /ws` authenticates the username cookie, upgrades the connection and
//! hands both halves of the socket to the chat core. From then on the
//! session tasks in `sonet-core` own the connection:
//!
//! - inbound text frames are classified and routed through the hub;
//! - chat messages, typing indicators and notifications addressed to the
//!   user are written back as JSON text frames.
//!
//! Ping/pong frames are answered by axum and never reach the session.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use sonet_core::session::start_session;
use sonet_core::transport::{FrameSink, FrameSource, Inbound};
use sonet_types::error::ChatError;
use sonet_types::user::UserProfile;

use crate::http::error::AppError;
use crate::http::extractors::auth::ChatUser;
use crate::state::AppState;

/// Upgrade an authenticated request to a chat connection.
///
/// Authentication runs first, so a missing or invalid cookie is answered
/// with 401 and never reaches the hub.
pub async fn ws_handler(
    ChatUser(profile): ChatUser,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    if state.hub.is_shutting_down() {
        return Err(ChatError::HubClosed.into());
    }
    let ws = ws.map_err(|rejection| ChatError::Upgrade(rejection.body_text()))?;

    let username = profile.username.clone();
    Ok(ws
        .on_failed_upgrade(move |err| {
            tracing::warn!(%username, error = %err, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_ws_connection(socket, state, profile)))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState, profile: UserProfile) {
    let (sink, stream) = socket.split();
    let username = profile.username.clone();

    if let Err(err) = start_session(&state.hub, profile, WsSource(stream), WsSink(sink)).await {
        tracing::warn!(%username, error = %err, "failed to start chat session");
    }
}

/// Read half of an axum WebSocket.
struct WsSource(SplitStream<WebSocket>);

impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<Inbound, ChatError>> {
        loop {
            let frame = match self.0.next().await? {
                Ok(WsMessage::Text(text)) => Inbound::Text(text.as_str().to_owned()),
                Ok(WsMessage::Binary(bytes)) => Inbound::Binary(bytes.len()),
                Ok(WsMessage::Close(_)) => Inbound::Close,
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
                Err(err) => return Some(Err(ChatError::Transport(err.to_string()))),
            };
            return Some(Ok(frame));
        }
    }
}

/// Write half of an axum WebSocket.
struct WsSink(SplitSink<WebSocket, WsMessage>);

impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), ChatError> {
        self.0
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(err) = self.0.close().await {
            tracing::debug!("WebSocket close error: {err}");
        }
    }
}
