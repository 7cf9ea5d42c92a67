//! HTTP surface for listing images
//!
//! Serves locally stored image bytes and hands out retrieval URLs for either
//! storage backend.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;
