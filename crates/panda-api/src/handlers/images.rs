use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use panda_services::{IssuedUrl, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifetime clients may cache served image bytes for; keys never change content.
pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Debug, Deserialize)]
pub struct ImageUrlQuery {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct ImageUrlResponse {
    pub key: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
}

impl From<IssuedUrl> for ImageUrlResponse {
    fn from(issued: IssuedUrl) -> Self {
        Self {
            key: issued.key,
            url: issued.url,
            expires_in_seconds: issued.expires_in.map(|ttl| ttl.as_secs()),
        }
    }
}

/// Stream a stored image.
///
/// Every failure, including identifiers that do not normalize, is reported
/// as not found.
#[tracing::instrument(skip(state))]
pub async fn get_image(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let stream = match state.storage.load(&key).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(error = %e, "Image not served");
            return HttpAppError(StorageError::NotFound(key)).into_response();
        }
    };

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    (
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL),
        ],
        Body::from_stream(body_stream),
    )
        .into_response()
}

/// Issue a retrieval URL for an image identifier.
#[tracing::instrument(skip(state))]
pub async fn get_image_url(
    Query(query): Query<ImageUrlQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ImageUrlResponse>, HttpAppError> {
    let issued = state.storage.issue_url(&query.key).await?;
    Ok(Json(issued.into()))
}
