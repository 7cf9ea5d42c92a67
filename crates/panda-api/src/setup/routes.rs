//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/images/{*key}", get(handlers::images::get_image))
        .route("/api/image-urls", get(handlers::images::get_image_url))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
