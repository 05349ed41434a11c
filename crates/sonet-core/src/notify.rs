//! Notification emitter used by the rest of the backend.
//!
//! Every call is fire-and-forget: the notification is handed to the hub,
//! which pushes it to the target's live session or drops it when the target
//! is offline. Notifications bypass the delivery policy.

use sonet_types::notification::{Notification, NotificationKind};
use sonet_types::user::UserId;
use tracing::debug;
use uuid::Uuid;

use crate::hub::HubHandle;

#[derive(Debug, Clone)]
pub struct Notifier {
    hub: HubHandle,
}

impl Notifier {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }

    /// Push free-form `content` to `user_id`.
    pub async fn notify(&self, user_id: UserId, content: impl Into<String>) {
        self.send(Notification::new(user_id, NotificationKind::Custom, content))
            .await;
    }

    /// Tell `followed` that `follower` asked to follow them.
    pub async fn notify_follow_request(&self, follower: UserId, followed: UserId) {
        debug!(%follower, %followed, "follow request notification");
        self.send(Notification::of_kind(followed, NotificationKind::FollowRequest))
            .await;
    }

    /// Tell `invitee` they were invited to `group_id`.
    pub async fn notify_group_invite(&self, group_id: Uuid, invitee: UserId) {
        debug!(%group_id, %invitee, "group invite notification");
        self.send(Notification::of_kind(invitee, NotificationKind::GroupInvite))
            .await;
    }

    /// Tell `member` a new event was created in `group_id`.
    pub async fn notify_group_event(&self, group_id: Uuid, member: UserId) {
        debug!(%group_id, %member, "group event notification");
        self.send(Notification::of_kind(member, NotificationKind::GroupEvent))
            .await;
    }

    /// Hand a prepared notification to the hub.
    pub async fn send(&self, notification: Notification) {
        let user_id = notification.user_id;
        if self.hub.notify(notification).await.is_err() {
            debug!(%user_id, "hub not running, notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::StaticGraph;
    use crate::hub::Hub;
    use crate::session::start_session;
    use crate::transport::memory::{connection, Peer};
    use sonet_types::config::ChatConfig;
    use sonet_types::user::UserProfile;
    use std::time::Duration;

    async fn connect(hub: &HubHandle, profile: &UserProfile) -> Peer {
        let (source, sink, peer) = connection();
        start_session(hub, profile.clone(), source, sink)
            .await
            .unwrap();
        while !hub.is_connected(&profile.username).await.unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        peer
    }

    #[tokio::test]
    async fn custom_notification_reaches_connected_user() {
        let graph = StaticGraph::new();
        let bob = graph.add_user("bob", false);
        let (hub, _task) = Hub::spawn(graph, ChatConfig::default());
        let notifier = Notifier::new(hub.clone());

        let mut b = connect(&hub, &bob).await;
        notifier.notify(bob.id, "new follower").await;

        let frame = b.recv().await.expect("notification frame");
        assert_eq!(frame["event"], "notification");
        assert_eq!(frame["kind"], "custom");
        assert_eq!(frame["content"], "new follower");
        assert_eq!(frame["read"], false);
        assert_eq!(frame["user_id"], bob.id.to_string());
    }

    #[tokio::test]
    async fn canned_notifications_use_default_text() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let bob = graph.add_user("bob", false);
        let (hub, _task) = Hub::spawn(graph, ChatConfig::default());
        let notifier = Notifier::new(hub.clone());

        let mut b = connect(&hub, &bob).await;
        notifier.notify_follow_request(alice.id, bob.id).await;
        notifier.notify_group_invite(Uuid::now_v7(), bob.id).await;
        notifier.notify_group_event(Uuid::now_v7(), bob.id).await;

        let kinds = [
            ("follow_request", "You have a new follow request!"),
            ("group_invite", "You have been invited to join a group!"),
            ("group_event", "A new event has been created in your group!"),
        ];
        for (kind, content) in kinds {
            let frame = b.recv().await.expect("notification frame");
            assert_eq!(frame["kind"], kind);
            assert_eq!(frame["content"], content);
        }
    }

    #[tokio::test]
    async fn offline_user_is_silently_skipped() {
        let graph = StaticGraph::new();
        let bob = graph.add_user("bob", false);
        let (hub, _task) = Hub::spawn(graph, ChatConfig::default());
        let notifier = Notifier::new(hub.clone());

        notifier.notify(bob.id, "you missed this").await;
        // Commands are handled in order, so this returns after the notify.
        hub.online_count().await.unwrap();

        let mut b = connect(&hub, &bob).await;
        b.expect_silence().await;
    }

    #[tokio::test]
    async fn stopped_hub_does_not_error() {
        let graph = StaticGraph::new();
        let bob = graph.add_user("bob", false);
        let (hub, task) = Hub::spawn(graph, ChatConfig::default());
        hub.shutdown();
        task.await.unwrap();

        Notifier::new(hub).notify(bob.id, "too late").await;
    }
}
