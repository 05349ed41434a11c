//! Infrastructure layer for sonet.
//!
//! Contains the SQLite implementation of the `SocialGraph` port defined in
//! `sonet-core`, the database pool, and configuration loading.

pub mod config;
pub mod sqlite;
