//! HTTP routes.

pub mod connections;
pub mod credentials;
pub mod node_types;
pub mod runs;
pub mod workflows;

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Workflows
        .route(
            "/api/workflows",
            get(workflows::list).post(workflows::create),
        )
        .route(
            "/api/workflows/{id}",
            get(workflows::get_one)
                .put(workflows::update)
                .delete(workflows::remove),
        )
        .route("/api/workflows/{id}/validate", post(workflows::validate))
        // Runs
        .route(
            "/api/workflows/{id}/runs",
            post(runs::start).get(runs::list),
        )
        .route("/api/runs/{id}", get(runs::get_one))
        .route("/hooks/{*path}", post(runs::webhook))
        // Credentials
        .route(
            "/api/credentials",
            get(credentials::list).post(credentials::create),
        )
        .route(
            "/api/credentials/{id}",
            get(credentials::get_one).delete(credentials::remove),
        )
        // Connections + OAuth
        .route(
            "/api/connections",
            get(connections::list).post(connections::create),
        )
        .route(
            "/api/connections/{id}",
            get(connections::get_one).delete(connections::remove),
        )
        .route("/api/connections/{id}/refresh", post(connections::refresh))
        .route("/oauth/callback", get(connections::oauth_callback))
        // Catalog
        .route("/api/node-types", get(node_types::catalog))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
