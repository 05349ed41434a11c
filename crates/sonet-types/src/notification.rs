//! System-originated notifications pushed to connected users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::UserId;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FollowRequest,
    GroupInvite,
    GroupEvent,
    /// Free-text notification raised by another part of the backend.
    Custom,
}

impl NotificationKind {
    /// Canned text shown to the user for this kind.
    pub fn default_content(&self) -> &'static str {
        match self {
            NotificationKind::FollowRequest => "You have a new follow request!",
            NotificationKind::GroupInvite => "You have been invited to join a group!",
            NotificationKind::GroupEvent => "A new event has been created in your group!",
            NotificationKind::Custom => "",
        }
    }
}

/// A notification targeted at a single user.
///
/// Not subject to the delivery policy: notifications come from the server
/// itself, not from another user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unread notification.
    pub fn new(user_id: UserId, kind: NotificationKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            kind,
            content: content.into(),
            read: false,
            created_at: Utc::now(),
        }
    }

    /// Create an unread notification carrying the kind's canned text.
    pub fn of_kind(user_id: UserId, kind: NotificationKind) -> Self {
        Self::new(user_id, kind, kind.default_content())
    }
}
