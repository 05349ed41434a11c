//! Social-graph port.
//!
//! The hub needs exactly two answers from the relational store: who a
//! username is (including their profile visibility), and whether two users
//! are linked by an accepted follow. Implementations live in sonet-infra
//! (e.g., `SqliteSocialGraph`).

use sonet_types::error::RepositoryError;
use sonet_types::user::{UserId, UserProfile};

/// Read-only view of users and follow relationships.
///
/// Called from inside the hub's control loop, so a slow implementation
/// stalls chat traffic; the hub bounds every call with a timeout.
pub trait SocialGraph: Send + Sync + 'static {
    /// Look up a user by username.
    fn find_user(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserProfile>, RepositoryError>> + Send;

    /// True if an accepted follow edge exists from `a` to `b` or from `b` to `a`.
    fn follows_either_way(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// In-memory social graph for tests.
    #[derive(Clone, Default)]
    pub struct StaticGraph {
        users: Arc<Mutex<Vec<UserProfile>>>,
        edges: Arc<Mutex<HashSet<(UserId, UserId)>>>,
        failing: bool,
        delay: Option<Duration>,
    }

    impl StaticGraph {
        pub fn new() -> Self {
            Self::default()
        }

        /// A graph whose follow lookups always error.
        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Self::default()
            }
        }

        /// A graph whose follow lookups take `delay` to answer.
        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn add_user(&self, username: &str, is_public: bool) -> UserProfile {
            let profile = UserProfile::new(UserId::new(), username, is_public);
            self.users.lock().unwrap().push(profile.clone());
            profile
        }

        /// Record an accepted follow from `follower` to `followed`.
        pub fn follow(&self, follower: &UserProfile, followed: &UserProfile) {
            self.edges.lock().unwrap().insert((follower.id, followed.id));
        }
    }

    impl SocialGraph for StaticGraph {
        async fn find_user(&self, username: &str) -> Result<Option<UserProfile>, RepositoryError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn follows_either_way(&self, a: &UserId, b: &UserId) -> Result<bool, RepositoryError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing {
                return Err(RepositoryError::Connection);
            }
            let edges = self.edges.lock().unwrap();
            Ok(edges.contains(&(*a, *b)) || edges.contains(&(*b, *a)))
        }
    }
}
