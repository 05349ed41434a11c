//! HTTP layer for sonet.
//!
//! Axum router exposing the chat WebSocket, the internal notification
//! endpoint and a health check, with envelope-formatted errors.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
