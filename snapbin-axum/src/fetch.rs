use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use snapbin_blob::{FetchBody, FetchResponse, FetchStatus, RequestHeaders};
use snapbin_core::SnapError;
use tracing::warn;

use crate::SnapAxumError;

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Pull the retrieval-relevant headers out once.
pub fn request_headers(headers: &HeaderMap) -> RequestHeaders {
    RequestHeaders {
        range: header_string(headers, header::RANGE),
        if_match: header_string(headers, header::IF_MATCH),
        if_none_match: header_string(headers, header::IF_NONE_MATCH),
        if_modified_since: header_string(headers, header::IF_MODIFIED_SINCE),
        if_unmodified_since: header_string(headers, header::IF_UNMODIFIED_SINCE),
        if_range: header_string(headers, header::IF_RANGE),
    }
}

fn terminal_error(status: FetchStatus) -> SnapError {
    match status {
        FetchStatus::PreconditionFailed => SnapError::precondition_failed(),
        FetchStatus::RangeNotSatisfiable => SnapError::range_not_satisfiable(),
        _ => SnapError::not_found("Object Not Found"),
    }
}

/// Turn an engine response into an HTTP one; terminal outcomes go through
/// the error envelope.
pub fn render(response: FetchResponse) -> Result<Response, SnapAxumError> {
    if response.status.is_error() {
        return Err(terminal_error(response.status).into());
    }

    let body = match response.body {
        FetchBody::Empty => Body::empty(),
        FetchBody::Full(bytes) => Body::from(bytes),
        FetchBody::Stream(stream) => Body::from_stream(stream),
    };

    let mut rendered = Response::new(body);
    *rendered.status_mut() =
        StatusCode::from_u16(response.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let headers = rendered.headers_mut();
    for (name, value) in response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "dropping unrepresentable response header"),
        }
    }

    Ok(rendered)
}
