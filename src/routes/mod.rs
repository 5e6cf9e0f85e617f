use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

pub mod analytics;
pub mod recommendations;
pub mod sessions;
pub mod state;
pub mod users;

pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(
            // Request ids are assigned before the trace span is created
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

/// API routes under /api
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommendations", post(recommendations::recommend))
        .route(
            "/analytics",
            post(analytics::ingest).get(analytics::read),
        )
        .route("/sessions", post(sessions::start))
        .route("/sessions/:id", get(sessions::stats).delete(sessions::end))
        .route("/sessions/:id/recommended", put(sessions::set_recommended))
        .route("/sessions/:id/interactions", post(sessions::track))
        .route("/sessions/:id/summary", post(sessions::summarize))
        .route("/sessions/:id/reset", post(sessions::reset))
        .route("/users", post(users::create))
        .route(
            "/users/:id/preferences",
            get(users::get_preferences).put(users::update_preferences),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
