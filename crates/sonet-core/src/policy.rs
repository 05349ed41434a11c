//! Delivery policy for peer-to-peer chat messages.
//!
//! A message may reach its recipient when the recipient is connected and
//! either has a public profile or shares an accepted follow edge with the
//! sender (either direction is enough). Lookup failures deny delivery.

use std::fmt;
use std::time::Duration;

use sonet_types::user::{UserId, UserProfile};
use tracing::warn;

use crate::graph::SocialGraph;

/// Outcome of a delivery check, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Recipient profile is public.
    RecipientPublic,
    /// An accepted follow exists between sender and recipient.
    FollowEdge,
    /// Recipient has no live session.
    RecipientOffline,
    /// Recipient is private and there is no accepted follow.
    NoFollowEdge,
    /// The social graph errored or timed out.
    GraphUnavailable,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::RecipientPublic | Decision::FollowEdge)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::RecipientPublic => write!(f, "recipient is public"),
            Decision::FollowEdge => write!(f, "accepted follow"),
            Decision::RecipientOffline => write!(f, "recipient offline"),
            Decision::NoFollowEdge => write!(f, "no accepted follow"),
            Decision::GraphUnavailable => write!(f, "social graph unavailable"),
        }
    }
}

/// Decides whether a sender may reach a recipient.
pub struct DeliveryPolicy<G> {
    graph: G,
    query_timeout: Duration,
}

impl<G: SocialGraph> DeliveryPolicy<G> {
    pub fn new(graph: G, query_timeout: Duration) -> Self {
        Self {
            graph,
            query_timeout,
        }
    }

    /// Check delivery from `sender` to `recipient`.
    ///
    /// `recipient` is the profile of the recipient's live session, or `None`
    /// when they are not connected.
    pub async fn can_deliver(&self, sender: UserId, recipient: Option<&UserProfile>) -> Decision {
        let Some(recipient) = recipient else {
            return Decision::RecipientOffline;
        };
        if recipient.is_public {
            return Decision::RecipientPublic;
        }

        let lookup = self.graph.follows_either_way(&sender, &recipient.id);
        match tokio::time::timeout(self.query_timeout, lookup).await {
            Ok(Ok(true)) => Decision::FollowEdge,
            Ok(Ok(false)) => Decision::NoFollowEdge,
            Ok(Err(err)) => {
                warn!(%sender, recipient = %recipient.id, error = %err, "follow lookup failed");
                Decision::GraphUnavailable
            }
            Err(_) => {
                warn!(
                    %sender,
                    recipient = %recipient.id,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "follow lookup timed out"
                );
                Decision::GraphUnavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::StaticGraph;

    fn policy(graph: StaticGraph) -> DeliveryPolicy<StaticGraph> {
        DeliveryPolicy::new(graph, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn offline_recipient_is_denied() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let decision = policy(graph).can_deliver(alice.id, None).await;
        assert_eq!(decision, Decision::RecipientOffline);
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn public_recipient_is_allowed_without_lookup() {
        // A failing graph proves the lookup is skipped.
        let graph = StaticGraph::failing();
        let alice = graph.add_user("alice", false);
        let bob = graph.add_user("bob", true);

        let decision = policy(graph).can_deliver(alice.id, Some(&bob)).await;
        assert_eq!(decision, Decision::RecipientPublic);
    }

    #[tokio::test]
    async fn private_recipient_without_follow_is_denied() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let carol = graph.add_user("carol", false);

        let decision = policy(graph).can_deliver(alice.id, Some(&carol)).await;
        assert_eq!(decision, Decision::NoFollowEdge);
    }

    #[tokio::test]
    async fn follow_in_either_direction_is_enough() {
        let graph = StaticGraph::new();
        let alice = graph.add_user("alice", false);
        let carol = graph.add_user("carol", false);
        let dave = graph.add_user("dave", false);
        graph.follow(&alice, &carol);
        graph.follow(&dave, &alice);

        let policy = policy(graph);
        assert_eq!(
            policy.can_deliver(alice.id, Some(&carol)).await,
            Decision::FollowEdge
        );
        assert_eq!(
            policy.can_deliver(carol.id, Some(&alice)).await,
            Decision::FollowEdge
        );
        assert_eq!(
            policy.can_deliver(alice.id, Some(&dave)).await,
            Decision::FollowEdge
        );
    }

    #[tokio::test]
    async fn graph_error_fails_closed() {
        let graph = StaticGraph::failing();
        let alice = graph.add_user("alice", false);
        let carol = graph.add_user("carol", false);

        let decision = policy(graph).can_deliver(alice.id, Some(&carol)).await;
        assert_eq!(decision, Decision::GraphUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_graph_times_out_and_fails_closed() {
        let graph = StaticGraph::slow(Duration::from_secs(10));
        let alice = graph.add_user("alice", false);
        let carol = graph.add_user("carol", false);
        graph.follow(&alice, &carol);

        let decision = policy(graph).can_deliver(alice.id, Some(&carol)).await;
        assert_eq!(decision, Decision::GraphUnavailable);
    }
}
