//! Connection transport ports.
//!
//! A live connection is split in two halves so the session reader and the
//! session writer can run as independent tasks. The HTTP layer adapts an
//! axum WebSocket to these traits; tests use in-memory channels.

use sonet_types::error::ChatError;

/// One inbound frame, already stripped of transport-level ping/pong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame (expected to hold one JSON chat frame).
    Text(String),
    /// A binary frame. Never valid for the chat protocol.
    Binary(usize),
    /// The peer sent a close frame.
    Close,
}

/// Read half of a connection.
pub trait FrameSource: Send + 'static {
    /// Next frame from the peer. `None` means the stream has ended.
    fn next_frame(
        &mut self,
    ) -> impl std::future::Future<Output = Option<Result<Inbound, ChatError>>> + Send;
}

/// Write half of a connection.
pub trait FrameSink: Send + 'static {
    /// Write one text frame.
    fn send_text(
        &mut self,
        text: String,
    ) -> impl std::future::Future<Output = Result<(), ChatError>> + Send;

    /// Close the connection. Errors are ignored; the peer may already be gone.
    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send;
}
