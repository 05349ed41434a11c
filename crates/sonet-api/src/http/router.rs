//! Axum router configuration with middleware.
//!
//! Routes: `/ws` (chat WebSocket, GET only), `/internal/notifications`
//! (POST, for other backend services) and `/health`.
//! Middleware: CORS, tracing.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(handlers::ws::ws_handler))
        .route(
            "/internal/notifications",
            post(handlers::notification::push_notification),
        )
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness plus the number of connected users.
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let (status, online) = match state.hub.online_count().await {
        Ok(count) if !state.hub.is_shutting_down() => ("ok", Some(count)),
        _ => ("shutting_down", None),
    };

    axum::Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "online": online,
    }))
}
