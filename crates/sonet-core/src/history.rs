//! Per-user message history kept in memory for replay on reconnect.
//!
//! Each delivered chat message is stored once and shared (`Arc`) between the
//! sender's and the recipient's logs. The store is unbounded and lives only
//! as long as the process.

use std::collections::HashMap;
use std::sync::Arc;

use sonet_types::message::Message;

/// Username -> ordered, append-only list of sent and received messages.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: HashMap<String, Vec<Arc<Message>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to `username`'s log.
    pub fn append(&mut self, username: &str, message: Arc<Message>) {
        self.entries
            .entry(username.to_string())
            .or_default()
            .push(message);
    }

    /// Full log for `username` in insertion order (empty if none).
    pub fn replay(&self, username: &str) -> Vec<Arc<Message>> {
        self.entries.get(username).cloned().unwrap_or_default()
    }

    /// Number of entries recorded for `username`.
    pub fn len(&self, username: &str) -> usize {
        self.entries.get(username).map_or(0, Vec::len)
    }

    /// Number of users with at least one entry.
    pub fn user_count(&self) -> usize {
        self.entries.len()
    }
}
