use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method},
    response::Response,
};
use snapbin_blob::{FetchMethod, FetchRequest};
use snapbin_core::SnapError;

use crate::{fetch, store_failure, SnapAxumError, SnapState};

/// `GET`/`HEAD /file/{*key}`
pub async fn get_file(
    State(state): State<SnapState>,
    method: Method,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Response, SnapAxumError> {
    serve(&state, &method, &headers, key).await
}

/// `GET /upload/{id}`, kept for clients that still build the old links.
pub async fn legacy_upload(
    State(state): State<SnapState>,
    method: Method,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, SnapAxumError> {
    serve(&state, &method, &headers, id).await
}

/// `/file/` with nothing after it.
pub async fn missing_id(State(state): State<SnapState>) -> SnapAxumError {
    if state.config.only_allow_public_bucket {
        return SnapError::not_found("Not Found").into();
    }
    SnapError::not_found("Missing ID").into()
}

async fn serve(
    state: &SnapState,
    method: &Method,
    headers: &HeaderMap,
    key: String,
) -> Result<Response, SnapAxumError> {
    if state.config.only_allow_public_bucket {
        return Err(SnapError::not_found("Not Found").into());
    }
    if key.is_empty() {
        return Err(SnapError::not_found("Missing ID").into());
    }

    let method = if method == Method::HEAD {
        FetchMethod::Head
    } else {
        FetchMethod::Get
    };
    let request = FetchRequest {
        method,
        key,
        headers: fetch::request_headers(headers),
    };

    let ctx = state.fetch_ctx(headers);
    let response = state
        .engine
        .fetch(&ctx, request)
        .await
        .map_err(|err| store_failure("Error occurred reading from R2", err))?;

    fetch::render(response)
}
