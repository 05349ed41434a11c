//! Application state wiring the chat hub to its infrastructure.
//!
//! AppState holds the running hub's handle plus the concrete SQLite social
//! graph, and is shared by every HTTP handler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use sonet_core::hub::{Hub, HubHandle};
use sonet_core::notify::Notifier;
use sonet_infra::sqlite::graph::SqliteSocialGraph;
use sonet_infra::sqlite::pool::{default_database_url, DatabasePool};
use sonet_types::config::GlobalConfig;
use tokio::task::JoinHandle;

use crate::http::extractors::auth::CookieAuth;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub notifier: Notifier,
    pub graph: SqliteSocialGraph,
    pub auth: Arc<CookieAuth>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Open the database under `data_dir` and start the chat hub.
    ///
    /// Returns the state and the hub's task, which finishes once
    /// `hub.shutdown()` has been called and the hub has drained.
    pub async fn init(
        config: GlobalConfig,
        data_dir: PathBuf,
    ) -> anyhow::Result<(Self, JoinHandle<()>)> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db_url = config
            .server
            .database_url
            .clone()
            .unwrap_or_else(|| default_database_url(&data_dir));
        let db_pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open database {db_url}"))?;

        Self::with_pool(config, data_dir, db_pool)
    }

    /// Start the chat hub over an already-open database.
    pub fn with_pool(
        config: GlobalConfig,
        data_dir: PathBuf,
        db_pool: DatabasePool,
    ) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let auth = CookieAuth::from_config(&config.auth)?;
        let graph = SqliteSocialGraph::new(db_pool.clone());
        let (hub, hub_task) = Hub::spawn(graph.clone(), config.chat.clone());

        let state = Self {
            notifier: Notifier::new(hub.clone()),
            hub,
            graph,
            auth: Arc::new(auth),
            config: Arc::new(config),
            data_dir,
            db_pool,
        };
        Ok((state, hub_task))
    }
}
