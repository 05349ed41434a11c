//! SQLite storage layer.
//!
//! Read-only access to the social graph, backed by SQLite with WAL mode and
//! split read/write connection pools.

pub mod graph;
pub mod pool;
