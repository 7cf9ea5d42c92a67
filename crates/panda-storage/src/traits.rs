//! Storage abstraction trait
//!
//! This module defines the Storage trait that both image backends implement,
//! and the closed set of errors the storage layer can raise.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use panda_core::{ErrorMetadata, ImageUpload, LogLevel, StorageBackend};
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid image identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Unknown image reference: {0}")]
    UnknownImageReference(String),

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable during {operation} of {key}: {message}")]
    Unavailable {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub(crate) fn unavailable(
        operation: &'static str,
        key: impl Into<String>,
        err: impl Display,
    ) -> Self {
        StorageError::Unavailable {
            operation,
            key: key.into(),
            message: err.to_string(),
        }
    }
}

impl ErrorMetadata for StorageError {
    fn http_status_code(&self) -> u16 {
        match self {
            StorageError::InvalidIdentifier(_) | StorageError::UnknownImageReference(_) => 400,
            StorageError::NotFound(_) => 404,
            StorageError::Unavailable { .. } | StorageError::ConfigError(_) => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            StorageError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            StorageError::UnknownImageReference(_) => "UNKNOWN_IMAGE_REFERENCE",
            StorageError::NotFound(_) => "NOT_FOUND",
            StorageError::Unavailable { .. } => "STORAGE_UNAVAILABLE",
            StorageError::ConfigError(_) => "CONFIGURATION_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn client_message(&self) -> String {
        match self {
            StorageError::InvalidIdentifier(msg) => msg.clone(),
            StorageError::UnknownImageReference(msg) => msg.clone(),
            StorageError::NotFound(_) => "Image not found".to_string(),
            StorageError::Unavailable { .. } => "Image storage is unavailable".to_string(),
            StorageError::ConfigError(_) => "Image storage is misconfigured".to_string(),
        }
    }

    fn is_sensitive(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable { .. } | StorageError::ConfigError(_)
        )
    }

    fn log_level(&self) -> LogLevel {
        match self {
            StorageError::InvalidIdentifier(_)
            | StorageError::UnknownImageReference(_)
            | StorageError::NotFound(_) => LogLevel::Debug,
            StorageError::Unavailable { .. } | StorageError::ConfigError(_) => LogLevel::Error,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Streamed image bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// A retrieval URL for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedUrl {
    /// Canonical key the URL points at
    pub key: String,
    pub url: String,
    /// Lifetime of a signed URL; `None` for URLs that never expire
    pub expires_in: Option<Duration>,
}

/// Storage abstraction trait
///
/// Both backends (local filesystem, object storage) implement this trait and
/// one of them is chosen at startup. Every method that takes an identifier
/// accepts any of the client-facing forms (API path, bare name, canonical
/// key) and normalizes it before touching the backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store an uploaded image and return its canonical key
    async fn store(&self, upload: &ImageUpload) -> StorageResult<String>;

    /// Stream the bytes of an image
    ///
    /// Backends that only serve through signed URLs report every image as
    /// not found here.
    async fn load(&self, identifier: &str) -> StorageResult<ByteStream>;

    /// Delete images by key
    ///
    /// All identifiers are validated before anything is deleted.
    async fn delete(&self, keys: &[String]) -> StorageResult<()>;

    /// Issue a URL clients can fetch the image from
    async fn issue_url(&self, identifier: &str) -> StorageResult<IssuedUrl>;

    /// Collapse a client-supplied identifier into a canonical key
    fn normalize(&self, identifier: &str) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
