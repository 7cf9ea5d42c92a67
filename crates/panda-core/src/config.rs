//! Configuration module
//!
//! This module provides configuration structures for the API server and the
//! image storage layer. Values come from environment variables (optionally
//! loaded from a `.env` file) and are validated once at startup.

use std::env;
use std::time::Duration;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 8080;
const LOCAL_STORAGE_PATH: &str = "uploads/listings";
const S3_KEY_PREFIX: &str = "listings";
const S3_PRESIGN_TTL_SECS: u64 = 900;
const S3_REGION: &str = "ap-northeast-2";

/// Storage configuration
///
/// Built once at startup and handed to the storage factory. Credentials are
/// kept here rather than in ambient process state so the object backend
/// client is constructed from exactly what was validated.
#[derive(Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_storage_path: String,
    pub s3_bucket: Option<String>,
    pub s3_key_prefix: String,
    pub s3_presign_ttl_secs: u64,
    pub s3_region: String,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("local_storage_path", &self.local_storage_path)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_key_prefix", &self.s3_key_prefix)
            .field("s3_presign_ttl_secs", &self.s3_presign_ttl_secs)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("aws_access_key_id", &self.aws_access_key_id.as_ref().map(|_| "***"))
            .field("aws_secret_access_key", &self.aws_secret_access_key.as_ref().map(|_| "***"))
            .field("aws_session_token", &self.aws_session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl StorageConfig {
    /// Local filesystem configuration rooted at `path`.
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: path.into(),
            s3_bucket: None,
            s3_key_prefix: S3_KEY_PREFIX.to_string(),
            s3_presign_ttl_secs: S3_PRESIGN_TTL_SECS,
            s3_region: S3_REGION.to_string(),
            s3_endpoint: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_session_token: None,
        }
    }

    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.s3_presign_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validate_key_prefix(&self.s3_key_prefix)?;

        if self.s3_presign_ttl_secs == 0 {
            return Err(anyhow::anyhow!(
                "S3_PRESIGN_TTL_SECONDS must be greater than zero"
            ));
        }

        match self.backend {
            StorageBackend::Local => {
                if self.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must not be empty when using local storage backend"
                    ));
                }
            }
            StorageBackend::Object => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using object storage backend"
                    ));
                }
                if self.aws_access_key_id.is_none() || self.aws_secret_access_key.is_none() {
                    return Err(anyhow::anyhow!(
                        "AWS credentials are missing. Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY."
                    ));
                }
            }
        }

        Ok(())
    }
}

fn validate_key_prefix(prefix: &str) -> Result<(), anyhow::Error> {
    if prefix.is_empty() {
        return Err(anyhow::anyhow!("S3_KEY_PREFIX must not be empty"));
    }
    if prefix.contains("..") || prefix.contains('\\') {
        return Err(anyhow::anyhow!(
            "S3_KEY_PREFIX must not contain '..' or '\\'"
        ));
    }
    if prefix.starts_with('/') || prefix.ends_with('/') {
        return Err(anyhow::anyhow!(
            "S3_KEY_PREFIX must not start or end with '/'"
        ));
    }
    Ok(())
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Blank values are treated as unset.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            var(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let server_port = match var("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => SERVER_PORT,
        };

        let backend = match var("STORAGE_BACKEND") {
            Some(backend) => backend.parse()?,
            None => StorageBackend::Local,
        };

        let s3_presign_ttl_secs = match var("S3_PRESIGN_TTL_SECONDS") {
            Some(ttl) => ttl
                .parse()
                .map_err(|_| anyhow::anyhow!("S3_PRESIGN_TTL_SECONDS must be a valid number"))?,
            None => S3_PRESIGN_TTL_SECS,
        };

        let storage = StorageConfig {
            backend,
            local_storage_path: var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| LOCAL_STORAGE_PATH.to_string()),
            s3_bucket: var("S3_BUCKET"),
            s3_key_prefix: var("S3_KEY_PREFIX").unwrap_or_else(|| S3_KEY_PREFIX.to_string()),
            s3_presign_ttl_secs,
            s3_region: var("S3_REGION")
                .or_else(|| var("AWS_REGION"))
                .unwrap_or_else(|| S3_REGION.to_string()),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            aws_session_token: var("AWS_SESSION_TOKEN"),
        };

        let config = Config {
            server_port,
            environment,
            storage,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.storage.validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage.backend
    }
}
