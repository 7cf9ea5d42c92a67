use crate::object::ObjectClient;
use crate::traits::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use panda_core::StorageConfig;
use std::time::Duration;

/// S3 client backed by `object_store`
///
/// Built once at startup from explicit credentials; the same handle uploads,
/// deletes and presigns.
#[derive(Debug, Clone)]
pub struct S3Client {
    store: AmazonS3,
}

impl S3Client {
    /// Create a new S3Client from storage configuration
    ///
    /// Fails when the bucket or the access key pair is missing, so a
    /// misconfigured deployment never starts serving.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let bucket = config
            .s3_bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;

        let access_key = non_blank(config.aws_access_key_id.as_deref());
        let secret_key = non_blank(config.aws_secret_access_key.as_deref());
        let (Some(access_key), Some(secret_key)) = (access_key, secret_key) else {
            return Err(StorageError::ConfigError(
                "AWS credentials are missing. Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY."
                    .to_string(),
            ));
        };

        let mut builder = AmazonS3Builder::new()
            .with_region(config.s3_region.clone())
            .with_bucket_name(bucket)
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key);

        if let Some(token) = non_blank(config.aws_session_token.as_deref()) {
            builder = builder.with_token(token);
        }

        if let Some(ref endpoint) = config.s3_endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Client { store })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl ObjectClient for S3Client {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectResult<()> {
        let location = Path::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> ObjectResult<()> {
        let location = Path::from(key);
        self.store.delete(&location).await
    }

    async fn signed_get_url(&self, key: &str, expires_in: Duration) -> ObjectResult<String> {
        let location = Path::from(key);
        let url = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await?;
        Ok(url.to_string())
    }
}
