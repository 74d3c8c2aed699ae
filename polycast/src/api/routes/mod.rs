//! API route modules.

pub mod channels;
pub mod health;
pub mod templates;

use axum::{Json, Router, extract::State, routing::get};

use crate::api::server::AppState;
use crate::channel::ManagerSummary;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/channels", channels::router())
        .nest("/api/templates", templates::router())
        .route("/api/state", get(summary))
        .nest("/health", health::router())
        .with_state(state)
}

/// Aggregate counts across every channel.
async fn summary(State(state): State<AppState>) -> Json<ManagerSummary> {
    Json(state.manager.lock().await.summary())
}
