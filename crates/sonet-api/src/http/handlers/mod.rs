//! HTTP request handlers.

pub mod notification;
pub mod ws;
