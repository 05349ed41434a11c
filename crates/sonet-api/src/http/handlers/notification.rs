//! Internal endpoint other backend services use to push notifications.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sonet_types::notification::{Notification, NotificationKind};
use sonet_types::user::UserId;

use crate::http::error::AppError;
use crate::state::AppState;

/// Body of `POST /internal/notifications`.
#[derive(Debug, Deserialize)]
pub struct PushNotificationRequest {
    pub user_id: UserId,
    pub kind: NotificationKind,
    /// Overrides the kind's canned text. Required for `custom`.
    #[serde(default)]
    pub content: Option<String>,
}

/// POST /internal/notifications - hand a notification to the hub.
///
/// Always 202 once accepted: delivery happens only if the user is connected.
pub async fn push_notification(
    State(state): State<AppState>,
    body: Result<Json<PushNotificationRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(request) = body?;

    let notification = match (request.kind, request.content) {
        (NotificationKind::Custom, None) => {
            return Err(AppError::Validation(
                "content is required for custom notifications".to_string(),
            ));
        }
        (kind, Some(content)) => Notification::new(request.user_id, kind, content),
        (kind, None) => Notification::of_kind(request.user_id, kind),
    };

    if state.hub.is_shutting_down() {
        return Err(AppError::Unavailable("chat hub is shutting down".to_string()));
    }
    state.notifier.send(notification).await;
    Ok(StatusCode::ACCEPTED)
}
