use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use snapbin_blob::ListOptions;

use crate::{store_failure, SnapAxumError, SnapState};

/// `GET /files/list`: one page of the bucket listing, pretty-printed.
pub async fn list(State(state): State<SnapState>) -> Result<Response, SnapAxumError> {
    let page = state
        .store
        .list(ListOptions::new(state.config.list_limit))
        .await
        .map_err(|err| store_failure("Error occurred listing R2", err))?;

    let body = serde_json::to_string_pretty(&page).map_err(anyhow::Error::new)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
