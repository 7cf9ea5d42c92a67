//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::Result;
use panda_core::Config;
use std::sync::Arc;

/// Build the storage backend, shared state and router
pub async fn initialize_app(config: &Config) -> Result<(Arc<AppState>, axum::Router)> {
    let storage = storage::setup_storage(config).await?;

    let state = Arc::new(AppState::new(storage));
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
