//! HTTP routing.
//!
//! Handlers are thin: they parse transport-level input, hand everything to
//! the engines, and map the result. No workflow rule lives here.

pub mod chat;
pub mod orders;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orders/new", post(orders::create))
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::get))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/chat/{room_id}/messages", post(chat::send_message))
        .route("/chat/{room_id}/close", post(chat::close))
        .route("/chat/{room_id}", get(chat::get_room))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe.
async fn health() -> &'static str {
    "ok"
}
