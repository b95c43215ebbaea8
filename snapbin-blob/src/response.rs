use bytes::Bytes;

use crate::preconditions::format_http_date;
use crate::{BlobMetadata, ByteStream, RangeSpec};

/// Outcome class of a retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    NoContent,
    PartialContent,
    NotModified,
    PreconditionFailed,
    RangeNotSatisfiable,
    NotFound,
}

impl FetchStatus {
    pub fn code(self) -> u16 {
        match self {
            FetchStatus::Ok => 200,
            FetchStatus::NoContent => 204,
            FetchStatus::PartialContent => 206,
            FetchStatus::NotModified => 304,
            FetchStatus::PreconditionFailed => 412,
            FetchStatus::RangeNotSatisfiable => 416,
            FetchStatus::NotFound => 404,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            200 => FetchStatus::Ok,
            204 => FetchStatus::NoContent,
            206 => FetchStatus::PartialContent,
            304 => FetchStatus::NotModified,
            412 => FetchStatus::PreconditionFailed,
            416 => FetchStatus::RangeNotSatisfiable,
            404 => FetchStatus::NotFound,
            _ => return None,
        })
    }

    /// Only full-body successes are ever written to the response cache.
    pub fn is_cacheable(self) -> bool {
        matches!(self, FetchStatus::Ok | FetchStatus::NoContent)
    }

    /// Whether the engine produced a terminal error rather than content.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            FetchStatus::PreconditionFailed | FetchStatus::RangeNotSatisfiable | FetchStatus::NotFound
        )
    }
}

pub enum FetchBody {
    Empty,
    Full(Bytes),
    Stream(ByteStream),
}

impl std::fmt::Debug for FetchBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchBody::Empty => f.write_str("Empty"),
            FetchBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            FetchBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A fully assembled retrieval response, independent of any HTTP library.
#[derive(Debug)]
pub struct FetchResponse {
    pub status: FetchStatus,
    pub headers: Vec<(String, String)>,
    pub body: FetchBody,
}

impl FetchResponse {
    pub fn empty(status: FetchStatus) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: FetchBody::Empty,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Header assembly for a blob response.
#[derive(Debug, Default)]
pub struct ResponseHeaders {
    headers: Vec<(String, String)>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_string(), value.into()));
    }

    fn push_opt(&mut self, name: &str, value: Option<&String>) {
        if let Some(value) = value {
            self.push(name, value.clone());
        }
    }

    /// Validators plus freshness; what a 304 carries.
    pub fn validators(mut self, meta: &BlobMetadata, default_cache_control: &str) -> Self {
        self.push("etag", meta.http_etag());
        self.push("last-modified", format_http_date(&meta.uploaded));
        let cache_control = meta
            .http_metadata
            .cache_control
            .clone()
            .unwrap_or_else(|| default_cache_control.to_string());
        self.push("cache-control", cache_control);
        if let Some(expires) = &meta.http_metadata.expires {
            self.push("expires", format_http_date(expires));
        }
        self
    }

    /// Every header of a 200/204/206 (or its `HEAD` twin).
    pub fn entity(mut self, meta: &BlobMetadata, range: Option<RangeSpec>, default_cache_control: &str) -> Self {
        self.push("accept-ranges", "bytes");
        self = self.validators(meta, default_cache_control);

        let http = &meta.http_metadata;
        let content_type = http
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        self.push("content-type", content_type);
        self.push_opt("content-encoding", http.content_encoding.as_ref());
        self.push_opt("content-language", http.content_language.as_ref());
        self.push_opt("content-disposition", http.content_disposition.as_ref());

        match range {
            Some(range) => {
                self.push("content-range", range.content_range(meta.size));
                self.push("content-length", range.length.to_string());
            }
            None => self.push("content-length", meta.size.to_string()),
        }
        self
    }

    pub fn build(self) -> Vec<(String, String)> {
        self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMetadata;
    use chrono::{TimeZone, Utc};

    fn meta() -> BlobMetadata {
        BlobMetadata {
            key: "a.txt".into(),
            size: 3,
            etag: "abc".into(),
            uploaded: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            http_metadata: HttpMetadata {
                content_language: Some("en".into()),
                ..HttpMetadata::default()
            },
        }
    }

    #[test]
    fn entity_headers_for_partial_content() {
        let headers = FetchResponse {
            status: FetchStatus::PartialContent,
            headers: ResponseHeaders::new()
                .entity(&meta(), Some(RangeSpec::new(0, 2)), "public, max-age=604800")
                .build(),
            body: FetchBody::Empty,
        };
        assert_eq!(headers.header("ETag"), Some("\"abc\""));
        assert_eq!(headers.header("content-range"), Some("bytes 0-1/3"));
        assert_eq!(headers.header("content-length"), Some("2"));
        assert_eq!(headers.header("content-type"), Some("application/octet-stream"));
        assert_eq!(headers.header("content-language"), Some("en"));
        assert_eq!(headers.header("content-encoding"), None);
        assert_eq!(headers.header("last-modified"), Some("Mon, 15 Jan 2024 12:00:00 GMT"));
        assert_eq!(headers.header("cache-control"), Some("public, max-age=604800"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(FetchStatus::NotModified.code(), 304);
        assert_eq!(FetchStatus::from_code(206), Some(FetchStatus::PartialContent));
        assert_eq!(FetchStatus::from_code(500), None);
        assert!(FetchStatus::NoContent.is_cacheable());
        assert!(!FetchStatus::PartialContent.is_cacheable());
    }
}
