use axum::{
    body::Body,
    extract::{OriginalUri, Query, State},
    http::{header, HeaderMap},
    Json,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use snapbin_blob::{random_slug, BlobPut, ByteStream};
use snapbin_core::SnapError;
use tracing::info;

use crate::urls::{delete_url, image_url, request_url};
use crate::{store_failure, SnapAxumError, SnapState};

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    filename: Option<String>,
}

/// `POST /upload?filename=`: stream the raw body into the store under
/// `{year}/{month}/{slug}`.
pub async fn upload(
    State(state): State<SnapState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Value>, SnapAxumError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    let (Some(content_type), Some(content_length)) = (content_type, content_length) else {
        return Err(SnapError::bad_request("content-length and content-type are required").into());
    };

    let request = request_url(&uri, &headers, &state.config)
        .ok_or_else(|| SnapError::bad_request("request URL could not be determined"))?;

    let slug = params
        .filename
        .filter(|f| !f.is_empty())
        .unwrap_or_else(random_slug);
    let key = state.keys.object_key(&slug, Utc::now());

    let mut put = BlobPut::new()
        .with_content_type(content_type)
        .with_cache_control(state.config.cache_control.clone());
    if let Ok(size) = content_length.trim().parse::<u64>() {
        put = put.with_size_hint(size);
    }

    let stream: ByteStream = Box::pin(body.into_data_stream().map_err(std::io::Error::other));
    let stored = state
        .store
        .put(&key, stream, put)
        .await
        .map_err(|err| store_failure("Error occured writing to R2", err))?;
    info!(key = %stored.key, size = stored.size, "blob uploaded");

    Ok(Json(json!({
        "success": true,
        "image": image_url(&request, &key, &state.config),
        "deleteUrl": delete_url(&request, &key, &state.config),
    })))
}
