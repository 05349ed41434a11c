//! The chat hub: a single actor owning every live session.
//!
//! `Hub::run` is the only code that reads or writes the session registry
//! and the message history. Sessions and the notification emitter reach it
//! through bounded `mpsc` channels wrapped by [`HubHandle`]:
//!
//! - **join**: register a session (replacing any session with the same
//!   username) and replay that user's history to it.
//! - **leave**: deregister a session, ignoring leaves from sessions that
//!   were already replaced.
//! - **message**: route typing indicators and chat messages, applying the
//!   [`DeliveryPolicy`] to the latter and recording delivered messages.
//! - **command**: notifications and read-only queries answered over
//!   `oneshot` channels.
//!
//! Each event is handled to completion before the next one is received, so
//! effects of concurrent joins, leaves and messages never interleave.
//! Channels are polled in a fixed order with joins ahead of leaves: a
//! session's join is queued before its reader exists, so its leave can never
//! be handled first. A session that is already disconnected when its join is
//! handled is not registered.
//! Writes to sessions go through their bounded outbound queues, waiting at
//! most `write_timeout` on a full queue.
//!
//! Cancelling the shutdown token makes the loop stop receiving, handle
//! whatever is already queued, disconnect every session and return.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sonet_types::config::ChatConfig;
use sonet_types::error::ChatError;
use sonet_types::message::{Message, MessageKind, ServerFrame};
use sonet_types::notification::Notification;
use sonet_types::user::UserId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::graph::SocialGraph;
use crate::history::HistoryStore;
use crate::policy::DeliveryPolicy;
use crate::session::{SessionHandle, SessionId};

/// A session announcing that its reader loop has ended.
#[derive(Debug, Clone)]
pub struct Departure {
    pub session_id: SessionId,
    pub username: String,
}

/// Requests that are neither joins, leaves nor chat traffic.
enum HubCommand {
    Notify(Notification),
    History {
        username: String,
        reply: oneshot::Sender<Vec<Arc<Message>>>,
    },
    IsConnected {
        username: String,
        reply: oneshot::Sender<bool>,
    },
    OnlineCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    join_tx: mpsc::Sender<SessionHandle>,
    leave_tx: mpsc::Sender<Departure>,
    message_tx: mpsc::Sender<Message>,
    command_tx: mpsc::Sender<HubCommand>,
    shutdown: CancellationToken,
    config: Arc<ChatConfig>,
}

impl HubHandle {
    /// Register a session. Waits while the join channel is full.
    pub async fn join(&self, session: SessionHandle) -> Result<(), ChatError> {
        self.join_tx
            .send(session)
            .await
            .map_err(|_| ChatError::HubClosed)
    }

    /// Deregister a session.
    pub async fn leave(&self, session_id: SessionId, username: String) -> Result<(), ChatError> {
        self.leave_tx
            .send(Departure {
                session_id,
                username,
            })
            .await
            .map_err(|_| ChatError::HubClosed)
    }

    /// Hand a classified message to the hub for routing.
    pub async fn send_message(&self, message: Message) -> Result<(), ChatError> {
        self.message_tx
            .send(message)
            .await
            .map_err(|_| ChatError::HubClosed)
    }

    /// Push a notification to its target user if they are connected.
    pub async fn notify(&self, notification: Notification) -> Result<(), ChatError> {
        self.command_tx
            .send(HubCommand::Notify(notification))
            .await
            .map_err(|_| ChatError::HubClosed)
    }

    /// Snapshot of `username`'s history.
    pub async fn history(&self, username: &str) -> Result<Vec<Arc<Message>>, ChatError> {
        let username = username.to_string();
        self.query(|reply| HubCommand::History { username, reply })
            .await
    }

    /// Whether `username` currently has a registered session.
    pub async fn is_connected(&self, username: &str) -> Result<bool, ChatError> {
        let username = username.to_string();
        self.query(|reply| HubCommand::IsConnected { username, reply })
            .await
    }

    /// Number of registered sessions.
    pub async fn online_count(&self) -> Result<usize, ChatError> {
        self.query(|reply| HubCommand::OnlineCount { reply }).await
    }

    async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HubCommand,
    ) -> Result<T, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(build(reply))
            .await
            .map_err(|_| ChatError::HubClosed)?;
        rx.await.map_err(|_| ChatError::HubClosed)
    }

    /// Ask the hub to drain and stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle")
            .field("shutting_down", &self.shutdown.is_cancelled())
            .finish()
    }
}

/// The chat manager actor.
pub struct Hub<G> {
    /// username -> live session.
    sessions: HashMap<String, SessionHandle>,
    /// user id -> username, for routing by recipient id.
    usernames: HashMap<UserId, String>,
    history: HistoryStore,
    policy: DeliveryPolicy<G>,
    write_timeout: Duration,
    join_rx: mpsc::Receiver<SessionHandle>,
    leave_rx: mpsc::Receiver<Departure>,
    message_rx: mpsc::Receiver<Message>,
    command_rx: mpsc::Receiver<HubCommand>,
    shutdown: CancellationToken,
}

impl<G: SocialGraph> Hub<G> {
    /// Create a hub and the handle used to reach it. Call [`Hub::run`] to
    /// start processing.
    pub fn new(graph: G, config: ChatConfig) -> (Self, HubHandle) {
        let capacity = config.channel_capacity.max(1);
        let (join_tx, join_rx) = mpsc::channel(capacity);
        let (leave_tx, leave_rx) = mpsc::channel(capacity);
        let (message_tx, message_rx) = mpsc::channel(capacity);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let shutdown = CancellationToken::new();

        let hub = Self {
            sessions: HashMap::new(),
            usernames: HashMap::new(),
            history: HistoryStore::new(),
            policy: DeliveryPolicy::new(graph, config.graph_query_timeout()),
            write_timeout: config.write_timeout(),
            join_rx,
            leave_rx,
            message_rx,
            command_rx,
            shutdown: shutdown.clone(),
        };
        let handle = HubHandle {
            join_tx,
            leave_tx,
            message_tx,
            command_tx,
            shutdown,
            config: Arc::new(config),
        };
        (hub, handle)
    }

    /// Create a hub and run it on a new task.
    pub fn spawn(graph: G, config: ChatConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(graph, config);
        (handle, tokio::spawn(hub.run()))
    }

    /// Control loop. Returns after shutdown has been requested or every
    /// handle has been dropped, once the queues have been drained.
    pub async fn run(mut self) {
        info!("chat hub started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(session) = self.join_rx.recv() => self.handle_join(session).await,
                Some(departure) = self.leave_rx.recv() => self.handle_leave(departure),
                Some(command) = self.command_rx.recv() => self.handle_command(command).await,
                message = self.message_rx.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    // Every handle is gone; nobody can reach the hub anymore.
                    None => break,
                },
            }
        }
        self.drain().await;
        info!("chat hub stopped");
    }

    async fn drain(&mut self) {
        self.join_rx.close();
        self.leave_rx.close();
        self.message_rx.close();
        self.command_rx.close();

        // Late joiners are turned away rather than registered.
        while let Ok(session) = self.join_rx.try_recv() {
            session.disconnect();
        }
        while let Ok(message) = self.message_rx.try_recv() {
            self.handle_message(message).await;
        }
        while let Ok(command) = self.command_rx.try_recv() {
            self.handle_command(command).await;
        }
        while let Ok(departure) = self.leave_rx.try_recv() {
            self.handle_leave(departure);
        }

        let remaining = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            session.disconnect();
        }
        self.usernames.clear();
        debug!(sessions = remaining, "disconnected remaining sessions");
    }

    async fn handle_join(&mut self, session: SessionHandle) {
        let username = session.profile.username.clone();
        if session.is_disconnected() {
            debug!(%username, session_id = %session.id, "session closed before join, not registering");
            return;
        }
        info!(%username, session_id = %session.id, "session joined");

        self.usernames.insert(session.profile.id, username.clone());
        if let Some(previous) = self.sessions.insert(username.clone(), session.clone()) {
            if previous.id != session.id {
                info!(%username, previous = %previous.id, "replacing existing session");
                previous.disconnect();
            }
        }

        self.replay_history(&session).await;
    }

    async fn replay_history(&self, session: &SessionHandle) {
        let messages = self.history.replay(&session.profile.username);
        if messages.is_empty() {
            return;
        }
        debug!(username = %session.profile.username, count = messages.len(), "replaying history");

        for message in messages {
            let frame = ServerFrame::Chat(Message::clone(&message));
            if let Err(err) = session.push(frame, self.write_timeout).await {
                warn!(
                    username = %session.profile.username,
                    error = %err,
                    "history replay interrupted"
                );
                break;
            }
        }
    }

    fn handle_leave(&mut self, departure: Departure) {
        let is_current = self
            .sessions
            .get(&departure.username)
            .is_some_and(|s| s.id == departure.session_id);

        if !is_current {
            debug!(
                username = %departure.username,
                session_id = %departure.session_id,
                "ignoring leave from replaced session"
            );
            return;
        }

        if let Some(session) = self.sessions.remove(&departure.username) {
            self.usernames.remove(&session.profile.id);
            info!(username = %departure.username, "session left");
        }
    }

    async fn handle_message(&mut self, message: Message) {
        match message.message_type {
            MessageKind::Typing => self.handle_typing(message).await,
            MessageKind::Message => self.handle_chat(message).await,
        }
    }

    async fn handle_typing(&self, message: Message) {
        let Some(target) = message.recipient_id.and_then(|id| self.session_for(&id)) else {
            return;
        };
        debug!(sender = %message.sender_username, recipient = %target.profile.username, "typing");

        if let Err(err) = target
            .push(ServerFrame::Chat(message), self.write_timeout)
            .await
        {
            debug!(recipient = %target.profile.username, error = %err, "failed to forward typing indicator");
        }
    }

    async fn handle_chat(&mut self, message: Message) {
        if message.is_empty() {
            debug!(sender = %message.sender_username, "dropping empty message");
            return;
        }
        let Some(recipient_id) = message.recipient_id else {
            debug!(
                sender = %message.sender_username,
                group_id = ?message.group_id,
                "message has no direct recipient, dropping"
            );
            return;
        };

        let recipient = self.session_for(&recipient_id).cloned();
        let decision = self
            .policy
            .can_deliver(message.sender_id, recipient.as_ref().map(|s| &s.profile))
            .await;

        let recipient = match recipient {
            Some(recipient) if decision.is_allowed() => recipient,
            _ => {
                warn!(
                    sender = %message.sender_username,
                    recipient = %recipient_id,
                    reason = %decision,
                    "message blocked"
                );
                return;
            }
        };

        debug!(
            sender = %message.sender_username,
            recipient = %recipient.profile.username,
            reason = %decision,
            "delivering message"
        );
        if let Err(err) = recipient
            .push(ServerFrame::Chat(message.clone()), self.write_timeout)
            .await
        {
            warn!(recipient = %recipient.profile.username, error = %err, "failed to deliver message");
        }

        let message = Arc::new(message);
        self.history
            .append(&message.sender_username, Arc::clone(&message));
        if recipient.profile.username != message.sender_username {
            self.history.append(&recipient.profile.username, message);
        }
    }

    async fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Notify(notification) => self.push_notification(notification).await,
            HubCommand::History { username, reply } => {
                let _ = reply.send(self.history.replay(&username));
            }
            HubCommand::IsConnected { username, reply } => {
                let _ = reply.send(self.sessions.contains_key(&username));
            }
            HubCommand::OnlineCount { reply } => {
                let _ = reply.send(self.sessions.len());
            }
        }
    }

    async fn push_notification(&self, notification: Notification) {
        let Some(target) = self.session_for(&notification.user_id) else {
            debug!(user_id = %notification.user_id, "user not connected, notification dropped");
            return;
        };

        let username = target.profile.username.clone();
        if let Err(err) = target
            .push(ServerFrame::Notification(notification), self.write_timeout)
            .await
        {
            warn!(%username, error = %err, "failed to push notification");
        }
    }

    fn session_for(&self, user_id: &UserId) -> Option<&SessionHandle> {
        self.usernames
            .get(user_id)
            .and_then(|username| self.sessions.get(username))
    }
}

impl<G> std::fmt::Debug for Hub<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("sessions", &self.sessions.len())
            .field("history_users", &self.history.user_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::StaticGraph;
    use chrono::Utc;
    use sonet_types::message::InboundFrame;
    use sonet_types::notification::NotificationKind;
    use sonet_types::user::UserProfile;
    use uuid::Uuid;

    struct Client {
        handle: SessionHandle,
        rx: mpsc::Receiver<ServerFrame>,
    }

    impl Client {
        fn connect(profile: &UserProfile) -> Self {
            let (tx, rx) = mpsc::channel(16);
            let handle = SessionHandle::new(
                Uuid::now_v7(),
                profile.clone(),
                tx,
                CancellationToken::new(),
            );
            Self { handle, rx }
        }

        fn frames(&mut self) -> Vec<ServerFrame> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                frames.push(frame);
            }
            frames
        }
    }

    fn hub(graph: StaticGraph) -> Hub<StaticGraph> {
        let (hub, _handle) = Hub::new(graph, ChatConfig::default());
        hub
    }

    fn chat(sender: &UserProfile, recipient: &UserProfile, content: &str) -> Message {
        frame_message(sender, Some(recipient), content, "", "message")
    }

    fn frame_message(
        sender: &UserProfile,
        recipient: Option<&UserProfile>,
        content: &str,
        emoji: &str,
        kind: &str,
    ) -> Message {
        let frame = InboundFrame {
            recipient_id: recipient.map(|r| r.id),
            content: content.to_string(),
            emoji: emoji.to_string(),
            message_type: kind.to_string(),
            ..Default::default()
        };
        Message::from_frame(frame, sender, Utc::now()).unwrap()
    }

    fn chat_contents(frames: &[ServerFrame]) -> Vec<String> {
        frames
            .iter()
            .filter_map(|f| match f {
                ServerFrame::Chat(m) => Some(m.content.clone()),
                ServerFrame::Notification(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn message_to_public_user_is_delivered_and_recorded() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let bob = graph.add_user("bob", true);
        let mut hub = hub(graph);

        let mut a = Client::connect(&alice);
        let mut b = Client::connect(&bob);
        hub.handle_join(a.handle.clone()).await;
        hub.handle_join(b.handle.clone()).await;

        hub.handle_message(chat(&alice, &bob, "hi")).await;

        assert_eq!(chat_contents(&b.frames()), vec!["hi"]);
        assert!(a.frames().is_empty(), "sender gets no echo");
        assert_eq!(hub.history.len("alice"), 1);
        assert_eq!(hub.history.len("bob"), 1);
    }

    #[tokio::test]
    async fn message_to_private_stranger_is_dropped() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let carol = graph.add_user("carol", false);
        let mut hub = hub(graph);

        let mut a = Client::connect(&alice);
        let mut c = Client::connect(&carol);
        hub.handle_join(a.handle.clone()).await;
        hub.handle_join(c.handle.clone()).await;

        hub.handle_message(chat(&alice, &carol, "hey")).await;

        assert!(c.frames().is_empty());
        assert!(a.frames().is_empty(), "no error surfaces to the sender");
        assert_eq!(hub.history.len("alice"), 0);
        assert_eq!(hub.history.len("carol"), 0);
    }

    #[tokio::test]
    async fn message_across_follow_edge_is_delivered() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let carol = graph.add_user("carol", false);
        graph.follow(&carol, &alice);
        let mut hub = hub(graph);

        let mut c = Client::connect(&carol);
        hub.handle_join(Client::connect(&alice).handle).await;
        hub.handle_join(c.handle.clone()).await;

        hub.handle_message(chat(&alice, &carol, "hello follower")).await;

        assert_eq!(chat_contents(&c.frames()), vec!["hello follower"]);
        assert_eq!(hub.history.len("carol"), 1);
    }

    #[tokio::test]
    async fn graph_failure_blocks_message() {
        let graph = StaticGraph::failing();
        let alice = graph.add_user("alice", false);
        let carol = graph.add_user("carol", false);
        let mut hub = hub(graph);

        let mut c = Client::connect(&carol);
        hub.handle_join(c.handle.clone()).await;

        hub.handle_message(chat(&alice, &carol, "hey")).await;

        assert!(c.frames().is_empty());
        assert_eq!(hub.history.len("alice"), 0);
    }

    #[tokio::test]
    async fn message_to_offline_user_is_dropped() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let bob = graph.add_user("bob", true);
        let mut hub = hub(graph);
        hub.handle_join(Client::connect(&alice).handle).await;

        hub.handle_message(chat(&alice, &bob, "anyone?")).await;

        assert_eq!(hub.history.len("alice"), 0);
        assert_eq!(hub.history.len("bob"), 0);
    }

    #[tokio::test]
    async fn empty_message_is_never_delivered() {
        let graph = StaticGraph::new();
        let dave = graph.add_user("dave", false);
        let bob = graph.add_user("bob", true);
        let mut hub = hub(graph);

        let mut b = Client::connect(&bob);
        hub.handle_join(b.handle.clone()).await;

        hub.handle_message(frame_message(&dave, Some(&bob), "", "", "message"))
            .await;

        assert!(b.frames().is_empty());
        assert_eq!(hub.history.user_count(), 0);
    }

    #[tokio::test]
    async fn emoji_only_message_is_delivered() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let bob = graph.add_user("bob", true);
        let mut hub = hub(graph);

        let mut b = Client::connect(&bob);
        hub.handle_join(b.handle.clone()).await;

        hub.handle_message(frame_message(&alice, Some(&bob), "", "👍", "message"))
            .await;

        let frames = b.frames();
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], ServerFrame::Chat(m) if m.emoji == "👍"));
    }

    #[tokio::test]
    async fn typing_is_forwarded_but_not_recorded() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        // Private recipient with no follow: typing bypasses the policy.
        let carol = graph.add_user("carol", false);
        let mut hub = hub(graph);

        let mut c = Client::connect(&carol);
        hub.handle_join(c.handle.clone()).await;

        hub.handle_message(frame_message(&alice, Some(&carol), "", "", "typing"))
            .await;

        let frames = c.frames();
        assert_eq!(frames.len(), 1);
        assert!(
            matches!(&frames[0], ServerFrame::Chat(m) if m.message_type == MessageKind::Typing)
        );
        assert_eq!(hub.history.user_count(), 0);
    }

    #[tokio::test]
    async fn group_only_message_is_dropped() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let mut hub = hub(graph);

        let mut message = frame_message(&alice, None, "hello group", "", "message");
        message.group_id = Some(Uuid::now_v7());
        hub.handle_message(message).await;

        assert_eq!(hub.history.user_count(), 0);
    }

    #[tokio::test]
    async fn join_replays_history_in_order_without_duplicates() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let bob = graph.add_user("bob", true);
        let mut hub = hub(graph);

        hub.handle_join(Client::connect(&bob).handle).await;
        for text in ["one", "two", "three"] {
            hub.handle_message(chat(&alice, &bob, text)).await;
        }

        let mut first = Client::connect(&alice);
        hub.handle_join(first.handle.clone()).await;
        assert_eq!(chat_contents(&first.frames()), vec!["one", "two", "three"]);

        let mut second = Client::connect(&alice);
        hub.handle_join(second.handle.clone()).await;
        assert_eq!(chat_contents(&second.frames()), vec!["one", "two", "three"]);
        assert_eq!(hub.history.len("alice"), 3);
    }

    #[tokio::test]
    async fn rejoin_replaces_and_disconnects_previous_session() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let bob = graph.add_user("bob", true);
        let mut hub = hub(graph);

        let mut old = Client::connect(&bob);
        let mut new = Client::connect(&bob);
        hub.handle_join(old.handle.clone()).await;
        hub.handle_join(new.handle.clone()).await;

        assert!(old.handle.is_disconnected());
        assert!(!new.handle.is_disconnected());

        hub.handle_message(chat(&alice, &bob, "to the new one")).await;
        assert!(old.frames().is_empty());
        assert_eq!(chat_contents(&new.frames()), vec!["to the new one"]);
    }

    #[tokio::test]
    async fn stale_leave_does_not_evict_newer_session() {
        let graph = StaticGraph::new();
        let bob = graph.add_user("bob", true);
        let mut hub = hub(graph);

        let old = Client::connect(&bob);
        let new = Client::connect(&bob);
        hub.handle_join(old.handle.clone()).await;
        hub.handle_join(new.handle.clone()).await;

        hub.handle_leave(Departure {
            session_id: old.handle.id,
            username: "bob".to_string(),
        });
        assert!(hub.sessions.contains_key("bob"));

        hub.handle_leave(Departure {
            session_id: new.handle.id,
            username: "bob".to_string(),
        });
        assert!(!hub.sessions.contains_key("bob"));
        assert!(hub.session_for(&bob.id).is_none());
    }

    #[tokio::test]
    async fn closed_session_is_not_registered() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", true);
        let bob = graph.add_user("bob", true);
        let mut hub = hub(graph);

        let mut current = Client::connect(&bob);
        hub.handle_join(current.handle.clone()).await;

        let gone = Client::connect(&bob);
        gone.handle.disconnect();
        hub.handle_join(gone.handle.clone()).await;
        assert!(!current.handle.is_disconnected(), "live session kept");

        hub.handle_leave(Departure {
            session_id: gone.handle.id,
            username: "bob".to_string(),
        });
        hub.handle_message(chat(&alice, &bob, "still here")).await;
        assert_eq!(chat_contents(&current.frames()), vec!["still here"]);

        hub.handle_leave(Departure {
            session_id: current.handle.id,
            username: "bob".to_string(),
        });
        let late = Client::connect(&bob);
        late.handle.disconnect();
        hub.handle_join(late.handle.clone()).await;
        assert!(hub.sessions.is_empty());
        assert!(hub.session_for(&bob.id).is_none());

        hub.handle_message(chat(&alice, &bob, "into the void")).await;
        assert_eq!(hub.history.len("bob"), 1);
        assert_eq!(hub.history.len("alice"), 1);
    }

    #[tokio::test]
    async fn notification_reaches_connected_user_only() {
        let graph = StaticGraph::new();
        let bob = graph.add_user("bob", false);
        let mut hub = hub(graph);

        // Not connected: dropped without error.
        hub.handle_command(HubCommand::Notify(Notification::new(
            bob.id,
            NotificationKind::Custom,
            "new follower",
        )))
        .await;

        let mut b = Client::connect(&bob);
        hub.handle_join(b.handle.clone()).await;
        assert!(b.frames().is_empty(), "dropped notification is not queued");

        hub.handle_command(HubCommand::Notify(Notification::new(
            bob.id,
            NotificationKind::Custom,
            "new follower",
        )))
        .await;

        let frames = b.frames();
        assert_eq!(frames.len(), 1);
        assert!(
            matches!(&frames[0], ServerFrame::Notification(n) if n.content == "new follower" && !n.read)
        );
        assert_eq!(hub.history.user_count(), 0, "notifications are not history");
    }

    #[tokio::test]
    async fn full_outbound_queue_does_not_block_forever() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let bob = graph.add_user("bob", true);
        let config = ChatConfig {
            write_timeout_ms: 20,
            ..ChatConfig::default()
        };
        let (mut hub, _handle) = Hub::new(graph, config);

        // Capacity-one queue that nobody drains.
        let (tx, _rx) = mpsc::channel(1);
        let session = SessionHandle::new(Uuid::now_v7(), bob.clone(), tx, CancellationToken::new());
        hub.handle_join(session).await;

        hub.handle_message(chat(&alice, &bob, "first")).await;
        hub.handle_message(chat(&alice, &bob, "second")).await;

        // Both were handled (and recorded) even though only one fit.
        assert_eq!(hub.history.len("bob"), 2);
    }

    #[tokio::test]
    async fn shutdown_disconnects_sessions_and_stops_loop() {
        let graph = StaticGraph::new();
        let bob = graph.add_user("bob", true);
        let (handle, task) = Hub::spawn(graph, ChatConfig::default());

        let client = Client::connect(&bob);
        handle.join(client.handle.clone()).await.unwrap();
        while !handle.is_connected("bob").await.unwrap() {
            tokio::task::yield_now().await;
        }

        handle.shutdown();
        task.await.unwrap();

        assert!(client.handle.is_disconnected());
        assert!(matches!(
            handle.online_count().await,
            Err(ChatError::HubClosed)
        ));
    }
}
