//! Axum router assembly. Middleware layers are applied before `.with_state`,
//! matching the order axum 0.8 requires for the layered service to see the
//! state-bearing handlers underneath it.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::proxy::proxy;
use crate::routes::{gateway_status, list_models};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/models", get(list_models))
        .route("/gateway/status", get(gateway_status))
        .fallback(proxy)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
