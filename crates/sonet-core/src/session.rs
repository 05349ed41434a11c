//! Per-connection session tasks.
//!
//! [`start_session`] wires an authenticated connection into the hub:
//!
//! 1. spawn the writer task, which drains the session's outbound queue into
//!    the connection;
//! 2. register the session with the hub (history replay happens there);
//! 3. spawn the reader task, which classifies inbound frames and forwards
//!    them to the hub until the peer goes away, a frame is malformed, the
//!    idle timeout fires or the session is cancelled.
//!
//! The reader sends exactly one leave for its session and then cancels the
//! session token, which stops the writer. The writer flushes anything still
//! queued before closing the connection.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sonet_types::error::ChatError;
use sonet_types::message::{InboundFrame, Message, MessageKind, ServerFrame};
use sonet_types::user::UserProfile;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::hub::HubHandle;
use crate::transport::{FrameSink, FrameSource, Inbound};

/// Identifies one connection of a user. A reconnect gets a fresh id.
pub type SessionId = Uuid;

/// The hub's view of a live session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub profile: UserProfile,
    outbound: mpsc::Sender<ServerFrame>,
    token: CancellationToken,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        profile: UserProfile,
        outbound: mpsc::Sender<ServerFrame>,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            profile,
            outbound,
            token,
        }
    }

    /// Queue a frame for the writer, waiting at most `timeout` for room.
    pub async fn push(&self, frame: ServerFrame, timeout: Duration) -> Result<(), ChatError> {
        self.outbound
            .send_timeout(frame, timeout)
            .await
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => {
                    ChatError::Transport(format!("outbound queue full after {timeout:?}"))
                }
                SendTimeoutError::Closed(_) => {
                    ChatError::Transport("session writer has stopped".to_string())
                }
            })
    }

    /// Force the session to end: the reader stops and the writer flushes and
    /// closes the connection.
    pub fn disconnect(&self) {
        self.token.cancel();
    }

    pub fn is_disconnected(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Reader-side state of a session.
struct Session {
    id: SessionId,
    profile: UserProfile,
    token: CancellationToken,
}

/// Turn one inbound text frame into a routable message.
///
/// Returns `Ok(None)` for a chat message with neither content nor emoji.
/// `ChatError::UnknownKind` is recoverable (the frame is skipped); any
/// other error means the frame was not valid JSON for the chat protocol.
pub fn classify(
    text: &str,
    sender: &UserProfile,
    now: DateTime<Utc>,
) -> Result<Option<Message>, ChatError> {
    let frame: InboundFrame =
        serde_json::from_str(text).map_err(|e| ChatError::Decode(e.to_string()))?;
    let message = Message::from_frame(frame, sender, now)?;

    match message.message_type {
        MessageKind::Message if message.is_empty() => Ok(None),
        MessageKind::Typing | MessageKind::Message => Ok(Some(message)),
    }
}

/// Bootstrap a session for an authenticated user on an open connection.
///
/// On success the session is registered with the hub and both session tasks
/// are running. If the hub has stopped the writer is cancelled (closing the
/// connection) and `ChatError::HubClosed` is returned.
pub async fn start_session<S, K>(
    hub: &HubHandle,
    profile: UserProfile,
    source: S,
    sink: K,
) -> Result<SessionId, ChatError>
where
    S: FrameSource,
    K: FrameSink,
{
    let id = Uuid::now_v7();
    let token = CancellationToken::new();
    let (outbound_tx, outbound_rx) = mpsc::channel(hub.config().outbound_capacity.max(1));

    tokio::spawn(run_writer(
        sink,
        outbound_rx,
        token.clone(),
        profile.username.clone(),
    ));

    let handle = SessionHandle::new(id, profile.clone(), outbound_tx, token.clone());
    if let Err(err) = hub.join(handle).await {
        token.cancel();
        return Err(err);
    }
    info!(username = %profile.username, session_id = %id, "user connected");

    let session = Session { id, profile, token };
    tokio::spawn(run_reader(source, session, hub.clone()));
    Ok(id)
}

async fn run_reader<S: FrameSource>(mut source: S, session: Session, hub: HubHandle) {
    let username = session.profile.username.clone();
    let idle = hub.config().idle_timeout();

    loop {
        let next = tokio::select! {
            _ = session.token.cancelled() => {
                debug!(%username, session_id = %session.id, "session cancelled");
                break;
            }
            next = next_frame(&mut source, idle) => next,
        };

        let text = match next {
            Err(_) => {
                info!(%username, "idle timeout, closing session");
                break;
            }
            Ok(None) | Ok(Some(Ok(Inbound::Close))) => {
                debug!(%username, "peer closed connection");
                break;
            }
            Ok(Some(Err(err))) => {
                debug!(%username, error = %err, "read failed");
                break;
            }
            Ok(Some(Ok(Inbound::Binary(len)))) => {
                warn!(%username, len, "binary frame rejected, closing session");
                break;
            }
            Ok(Some(Ok(Inbound::Text(text)))) => text,
        };

        match classify(&text, &session.profile, Utc::now()) {
            Ok(Some(message)) => {
                if hub.send_message(message).await.is_err() {
                    debug!(%username, "hub closed, ending session");
                    break;
                }
            }
            Ok(None) => debug!(%username, "ignoring empty message"),
            Err(ChatError::UnknownKind(kind)) => {
                warn!(%username, %kind, "ignoring frame with unknown message type");
            }
            Err(err) => {
                warn!(%username, error = %err, "malformed frame, closing session");
                break;
            }
        }
    }

    if hub.leave(session.id, username.clone()).await.is_err() {
        debug!(%username, "hub closed before leave");
    }
    session.token.cancel();
    info!(%username, session_id = %session.id, "user disconnected");
}

async fn next_frame<S: FrameSource>(
    source: &mut S,
    idle: Option<Duration>,
) -> Result<Option<Result<Inbound, ChatError>>, Elapsed> {
    match idle {
        Some(limit) => tokio::time::timeout(limit, source.next_frame()).await,
        None => Ok(source.next_frame().await),
    }
}

async fn run_writer<K: FrameSink>(
    mut sink: K,
    mut outbound: mpsc::Receiver<ServerFrame>,
    token: CancellationToken,
    username: String,
) {
    let mut healthy = true;
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(err) = write_frame(&mut sink, &frame).await {
                    debug!(%username, error = %err, "write failed, ending session");
                    healthy = false;
                    break;
                }
            }
        }
    }

    // Stops the reader when the writer is the side that failed.
    token.cancel();

    if healthy {
        outbound.close();
        let mut flushed = 0usize;
        while let Ok(frame) = outbound.try_recv() {
            if write_frame(&mut sink, &frame).await.is_err() {
                break;
            }
            flushed += 1;
        }
        if flushed > 0 {
            debug!(%username, flushed, "flushed queued frames before close");
        }
    }
    sink.close().await;
}

async fn write_frame<K: FrameSink>(sink: &mut K, frame: &ServerFrame) -> Result<(), ChatError> {
    let text = serde_json::to_string(frame)
        .map_err(|e| ChatError::Transport(format!("failed to encode frame: {e}")))?;
    sink.send_text(text).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
