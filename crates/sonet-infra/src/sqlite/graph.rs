//! SQLite social-graph implementation.
//!
//! Implements `SocialGraph` from `sonet-core` over the `users` and
//! `followers` tables. Only the reader pool is used.

use sonet_core::graph::SocialGraph;
use sonet_types::error::RepositoryError;
use sonet_types::user::{UserId, UserProfile};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SocialGraph`.
#[derive(Debug, Clone)]
pub struct SqliteSocialGraph {
    pool: DatabasePool,
}

impl SqliteSocialGraph {
    /// Create a new graph reader backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, RepositoryError> {
    let id_str: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let username: String = row
        .try_get("username")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let is_private: bool = row
        .try_get("is_private")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    let id = id_str
        .parse::<UserId>()
        .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?;

    Ok(UserProfile::new(id, username, !is_private))
}

impl SocialGraph for SqliteSocialGraph {
    async fn find_user(&self, username: &str) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query("SELECT id, username, is_private FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn follows_either_way(&self, a: &UserId, b: &UserId) -> Result<bool, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM followers
               WHERE status = 'accepted'
                 AND ((follower_id = ?1 AND followed_id = ?2)
                   OR (follower_id = ?2 AND followed_id = ?1))"#,
        )
        .bind(a.to_string())
        .bind(b.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count > 0)
    }
}
