//! Chat traffic types.
//!
//! Clients send [`InboundFrame`]s, a deliberately lenient JSON shape. The
//! session reader turns each frame into a [`Message`], stamping the fields
//! the server is authoritative for (sender identity and delivery time).
//! Everything the server pushes back is a [`ServerFrame`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::error::ChatError;
use crate::notification::Notification;
use crate::user::{UserId, UserProfile};

/// Discriminator for chat traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Ephemeral "user is typing" indicator. Never recorded.
    Typing,
    /// A real chat message with text and/or emoji.
    Message,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Typing => write!(f, "typing"),
            MessageKind::Message => write!(f, "message"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "typing" => Ok(MessageKind::Typing),
            "message" => Ok(MessageKind::Message),
            other => Err(ChatError::UnknownKind(other.to_string())),
        }
    }
}

/// A unit of chat traffic as routed by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: UserId,
    pub sender_username: String,
    /// Direct-message target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<UserId>,
    /// Group target. Carried on the wire but not routed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub emoji: String,
    pub message_type: MessageKind,
    pub created_at: DateTime<Utc>,
    pub delivered_at: DateTime<Utc>,
}

impl Message {
    /// Build a message from a client frame sent over `sender`'s session.
    ///
    /// Sender id, sender username and `delivered_at` always come from the
    /// server; whatever the client put there is discarded. A missing id is
    /// generated and a missing `created_at` defaults to `now`.
    pub fn from_frame(
        frame: InboundFrame,
        sender: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<Self, ChatError> {
        let message_type: MessageKind = frame.message_type.parse()?;
        Ok(Self {
            id: frame.id.unwrap_or_else(Uuid::now_v7),
            sender_id: sender.id,
            sender_username: sender.username.clone(),
            recipient_id: frame.recipient_id,
            group_id: frame.group_id,
            content: frame.content,
            emoji: frame.emoji,
            message_type,
            created_at: frame.created_at.unwrap_or(now),
            delivered_at: now,
        })
    }

    /// True when there is neither text nor emoji to deliver.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.emoji.is_empty()
    }
}

/// JSON frame as sent by a client.
///
/// Only `message_type` is required. Sender fields and timestamps may be
/// present but are ignored or overwritten by [`Message::from_frame`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub sender_id: Option<UserId>,
    #[serde(default)]
    pub sender_username: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<UserId>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub emoji: String,
    pub message_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Frame pushed from the server to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A chat message or typing indicator (live or history replay).
    Chat(Message),
    /// A system notification.
    Notification(Notification),
}
