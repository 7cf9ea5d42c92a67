//! Panda Core Library
//!
//! This crate provides the configuration, error metadata, and image models
//! shared by the storage, services, and API crates.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, StorageConfig};
pub use error::{ErrorMetadata, LogLevel};
pub use models::{ImageRef, ImageUpload, ListingImages};
pub use storage_types::StorageBackend;
