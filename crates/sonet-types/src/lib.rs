//! Shared domain types for sonet.
//!
//! This crate contains the types exchanged by the real-time messaging core:
//! users and their visibility, chat messages and typing indicators, system
//! notifications, the outbound wire frame, configuration and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod message;
pub mod notification;
pub mod user;
