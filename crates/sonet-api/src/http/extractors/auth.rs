//! Cookie authentication for chat connections.
//!
//! The username is read from a cookie (`username` by default). When a signing
//! key is configured the cookie must carry a valid signature, otherwise its
//! plain value is trusted. The username is then resolved against the social
//! graph; unknown users are rejected.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::Engine;
use cookie::{Cookie, CookieJar, Key};
use sonet_core::graph::SocialGraph;
use sonet_types::config::AuthConfig;
use sonet_types::error::{ChatError, RepositoryError};
use sonet_types::user::UserProfile;

use crate::http::error::AppError;
use crate::state::AppState;

/// Reads (and optionally verifies) the username cookie.
pub struct CookieAuth {
    cookie_name: String,
    key: Option<Key>,
}

impl CookieAuth {
    /// Build from configuration. The signing key, when present, is base64 and
    /// must decode to at least 64 bytes.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let key = match &config.cookie_signing_key {
            None => None,
            Some(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| anyhow::anyhow!("cookie_signing_key is not valid base64: {e}"))?;
                let key = Key::try_from(bytes.as_slice()).map_err(|_| {
                    anyhow::anyhow!(
                        "cookie_signing_key must decode to at least 64 bytes (got {})",
                        bytes.len()
                    )
                })?;
                Some(key)
            }
        };

        Ok(Self {
            cookie_name: config.username_cookie.clone(),
            key,
        })
    }

    pub fn is_signed(&self) -> bool {
        self.key.is_some()
    }

    /// Extract the authenticated username from request headers.
    pub fn username(&self, headers: &HeaderMap) -> Result<String, ChatError> {
        let cookie = find_cookie(headers, &self.cookie_name).ok_or_else(|| {
            ChatError::Unauthenticated(format!("Missing '{}' cookie", self.cookie_name))
        })?;

        let username = match &self.key {
            None => cookie.value().to_string(),
            Some(key) => {
                let mut jar = CookieJar::new();
                jar.add_original(cookie);
                jar.signed(key)
                    .get(&self.cookie_name)
                    .map(|c| c.value().to_string())
                    .ok_or_else(|| {
                        ChatError::Unauthenticated(format!(
                            "Invalid signature on '{}' cookie",
                            self.cookie_name
                        ))
                    })?
            }
        };

        if username.trim().is_empty() {
            return Err(ChatError::Unauthenticated(format!(
                "Empty '{}' cookie",
                self.cookie_name
            )));
        }
        Ok(username)
    }
}

/// Find a cookie by name across all `Cookie` headers.
fn find_cookie(headers: &HeaderMap, name: &str) -> Option<Cookie<'static>> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .flatten()
        .find(|cookie| cookie.name() == name)
        .map(Cookie::into_owned)
}

/// The user behind a chat connection. Extracting this authenticates the
/// request and resolves the profile (including visibility).
pub struct ChatUser(pub UserProfile);

impl FromRequestParts<AppState> for ChatUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let username = state.auth.username(&parts.headers)?;

        let lookup = state.graph.find_user(&username);
        let profile = tokio::time::timeout(state.config.chat.graph_query_timeout(), lookup)
            .await
            .map_err(|_| RepositoryError::Timeout)??;

        match profile {
            Some(profile) => Ok(ChatUser(profile)),
            None => {
                tracing::debug!(%username, "rejecting connection for unknown user");
                Err(ChatError::Unauthenticated(format!("Unknown user '{username}'")).into())
            }
        }
    }
}
