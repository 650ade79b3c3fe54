//! Route definitions

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers,
    middleware::{BearerAuthLayer, cors_layer},
    state::AppState,
};

/// Create the router with every route and layer
///
/// CORS sits outermost so preflights never reach authentication and rejected
/// requests still carry CORS headers.
pub fn create_router(state: AppState) -> Router {
    let auth = BearerAuthLayer::from_token(state.config.security.token());
    let body_limit = DefaultBodyLimit::max(state.config.server.max_body_bytes);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/v1/ping", get(handlers::health::ping))
        // Summarize
        .route("/v1/summarize", post(handlers::summarize::summarize))
        .route(
            "/v1/summarize/{id}/events",
            get(handlers::events::summarize_events),
        )
        // Maintenance
        .route("/v1/refresh-free", post(handlers::refresh_free::refresh_free))
        .route(
            "/v1/refresh-free/{id}/events",
            get(handlers::events::refresh_free_events),
        )
        .with_state(state)
        .layer(auth)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}
