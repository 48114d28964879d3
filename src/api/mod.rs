//! Operational HTTP surface: liveness and driver status.

pub mod handlers;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the ops router with request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::system::routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
