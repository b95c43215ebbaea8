use axum::{
    extract::{Request, State},
    http::{HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use snapbin_core::SnapError;
use tracing::debug;

use crate::{query_param, SnapAxumError, SnapState};

/// Shared-secret check: `x-auth-key` header or `authkey` query parameter.
pub async fn require_auth(
    State(state): State<SnapState>,
    request: Request,
    next: Next,
) -> Result<Response, SnapAxumError> {
    if is_authorized(&state.config.auth_key, request.headers(), request.uri()) {
        return Ok(next.run(request).await);
    }
    debug!(path = %request.uri().path(), "rejected unauthenticated request");
    Err(SnapError::missing_auth().into())
}

pub fn is_authorized(expected: &str, headers: &HeaderMap, uri: &Uri) -> bool {
    let header = headers.get("x-auth-key").and_then(|v| v.to_str().ok());
    if header == Some(expected) {
        return true;
    }
    query_param(uri, "authkey").as_deref() == Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_or_query_key_is_accepted() {
        let mut headers = HeaderMap::new();
        let uri: Uri = "/files/list".parse().unwrap();
        assert!(!is_authorized("test", &headers, &uri));

        headers.insert("x-auth-key", HeaderValue::from_static("test"));
        assert!(is_authorized("test", &headers, &uri));

        let uri: Uri = "/files/list?authkey=test".parse().unwrap();
        assert!(is_authorized("test", &HeaderMap::new(), &uri));

        headers.insert("x-auth-key", HeaderValue::from_static("invalid"));
        let uri: Uri = "/files/list?authkey=nope".parse().unwrap();
        assert!(!is_authorized("test", &headers, &uri));
    }
}
