use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::handlers;
use crate::state::AppState;

/// The application router: health probe, question submission and the
/// read-only action history the presentation layer polls.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/questions", post(handlers::submit_question))
        .route("/api/actions", get(handlers::list_actions))
        .route("/api/actions/:action_id", get(handlers::get_action))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
