use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use snapbin_blob::BlobError;
use snapbin_core::{SnapError, UpstreamError};
use tracing::error;

#[derive(Debug)]
pub struct SnapAxumError(pub SnapError);

impl From<SnapError> for SnapAxumError {
    fn from(e: SnapError) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for SnapAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(SnapError::normalize(e))
    }
}

/// 500 carrying the failing store call as `{name, message}`.
pub fn store_failure(message: &str, err: BlobError) -> SnapAxumError {
    let upstream = UpstreamError::new(err.name(), err.detail());
    SnapError::general_error(message)
        .with_upstream(upstream)
        .with_source(anyhow::Error::new(err))
        .into()
}

impl IntoResponse for SnapAxumError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %err, "request failed");
        }

        if err.kind.is_plain_text() {
            return (status, err.message).into_response();
        }
        (status, Json(err.to_json())).into_response()
    }
}
