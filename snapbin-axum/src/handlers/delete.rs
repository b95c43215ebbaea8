use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use snapbin_core::SnapError;
use tracing::info;

use crate::{store_failure, SnapAxumError, SnapState};

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    filename: Option<String>,
}

/// `GET /delete?filename=`: drop the cached response, then the blob.
pub async fn delete(
    State(state): State<SnapState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Value>, SnapAxumError> {
    let Some(key) = params.filename.filter(|f| !f.is_empty()) else {
        return Err(SnapError::not_found("Missing filename").into());
    };

    const FAILURE: &str = "Error occurred deleting from R2";

    let cache_key = state.engine.cache_key(&key);
    let evicted = state
        .cache
        .delete(&cache_key)
        .await
        .map_err(|err| store_failure(FAILURE, err))?;

    state
        .store
        .delete(&key)
        .await
        .map_err(|err| store_failure(FAILURE, err))?;

    info!(key = %key, evicted, "blob deleted");
    Ok(Json(json!({ "success": true })))
}
