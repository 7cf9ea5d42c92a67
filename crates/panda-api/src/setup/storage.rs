//! Storage setup and initialization

use anyhow::{Context, Result};
use panda_core::Config;
use panda_services::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing image storage...");
    let storage = create_storage(config.storage())
        .await
        .context("Failed to initialize image storage")?;
    tracing::info!(
        backend = %storage.backend_type(),
        "Image storage initialized successfully"
    );
    Ok(storage)
}
