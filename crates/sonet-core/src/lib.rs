//! Real-time messaging core for sonet.
//!
//! The [`hub::Hub`] is a single actor that owns every live session, the
//! per-user message history and the delivery decisions. Everything else
//! talks to it through a cloneable [`hub::HubHandle`].
//!
//! This crate defines the ports it needs from the outside world
//! ([`graph::SocialGraph`], [`transport::FrameSource`] and
//! [`transport::FrameSink`]) and never depends on a database or HTTP crate.

pub mod graph;
pub mod history;
pub mod hub;
pub mod notify;
pub mod policy;
pub mod session;
pub mod transport;
