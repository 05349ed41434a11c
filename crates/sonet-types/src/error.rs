use thiserror::Error;

/// Errors raised by the real-time messaging layer.
///
/// Only `Upgrade`, `Unauthenticated`, `Decode` and `Transport` end a session.
/// `UnknownKind` is reported and the offending frame skipped.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("websocket upgrade failed: {0}")]
    Upgrade(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("unknown message kind '{0}'")]
    UnknownKind(String),

    #[error("malformed frame: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("chat hub is not running")]
    HubClosed,
}

/// Errors from repository operations (used by port definitions in sonet-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("query timed out")]
    Timeout,
}
