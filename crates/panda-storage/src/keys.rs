//! Key generation and identifier normalization shared by all backends.
//!
//! A generated key is `{namespace}/{uuid}{ext}` (or `{uuid}{ext}` when the
//! backend has no namespace). Normalization accepts the public API path,
//! a bare file name, or a canonical key and returns the canonical key.

use crate::traits::{StorageError, StorageResult};
use uuid::Uuid;

/// Public path under which images are served and referenced by clients.
pub const IMAGE_API_PREFIX: &str = "/api/images/";

const MAX_EXTENSION_LEN: usize = 10;

/// Generates and normalizes storage keys for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    namespace: Option<String>,
}

impl KeyCodec {
    /// Codec for a backend whose namespace is implicit (a local base directory).
    pub fn flat() -> Self {
        Self { namespace: None }
    }

    /// Codec that places generated keys, and bare file names, under `namespace`.
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: Some(namespace.trim_matches('/').to_string()),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Generate a fresh key for an uploaded file.
    ///
    /// The original extension is kept verbatim (including case) when it is
    /// 1-10 ASCII alphanumerics; anything else yields no extension.
    pub fn generate_key(&self, original_filename: Option<&str>) -> String {
        let extension = original_filename.map(extract_extension).unwrap_or("");
        let filename = format!("{}{}", Uuid::new_v4(), extension);
        match &self.namespace {
            Some(namespace) => format!("{}/{}", namespace, filename),
            None => filename,
        }
    }

    /// Collapse any accepted identifier form into a canonical key.
    pub fn normalize(&self, identifier: &str) -> StorageResult<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(StorageError::InvalidIdentifier(
                "Image identifier must not be blank".to_string(),
            ));
        }
        if identifier.contains('\\') || identifier.contains("..") {
            return Err(StorageError::InvalidIdentifier(format!(
                "Image identifier contains invalid characters: {}",
                identifier
            )));
        }
        if identifier.ends_with('/') {
            return Err(StorageError::InvalidIdentifier(format!(
                "Image identifier must not end with '/': {}",
                identifier
            )));
        }

        let key = identifier
            .strip_prefix(IMAGE_API_PREFIX)
            .unwrap_or(identifier);

        match &self.namespace {
            Some(namespace) => {
                let key = key.trim_start_matches('/');
                if key.is_empty() {
                    return Err(StorageError::InvalidIdentifier(format!(
                        "Image identifier has no file name: {}",
                        identifier
                    )));
                }
                if key.contains('/') {
                    Ok(key.to_string())
                } else {
                    Ok(format!("{}/{}", namespace, key))
                }
            }
            // The backend settles containment and canonical spelling against its base directory.
            None => Ok(key.to_string()),
        }
    }
}

/// Public API path for a canonical key.
pub fn api_path(key: &str) -> String {
    format!("{}{}", IMAGE_API_PREFIX, key)
}

/// Extension of `filename` including the leading dot, or `""`.
pub fn extract_extension(filename: &str) -> &str {
    let filename = filename.trim();
    let Some(dot) = filename.rfind('.') else {
        return "";
    };
    let extension = &filename[dot..];
    let body = &extension[1..];
    if (1..=MAX_EXTENSION_LEN).contains(&body.len())
        && body.chars().all(|c| c.is_ascii_alphanumeric())
    {
        extension
    } else {
        ""
    }
}
