use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use super::middleware::{logging_middleware, require_builder_access, track_activity};
use super::proxy::proxy_request;
use super::state::AppState;

/// Builds the gateway pipeline. Stages run outermost first:
/// access log → authorization → activity tracking → proxy.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .fallback(proxy_request)
        .layer(middleware::from_fn_with_state(state.clone(), track_activity))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_builder_access,
        ))
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
