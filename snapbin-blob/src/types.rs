use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use uuid::Uuid;

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Wrap an in-memory buffer as a single-chunk [`ByteStream`].
pub fn byte_stream(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(futures_util::stream::once(async move { Ok(data) }))
}

/// HTTP-facing attributes stored alongside a blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

/// Metadata the store owns for every blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    pub key: String,
    pub size: u64,
    /// Strong validator, stored without quotes
    pub etag: String,
    pub uploaded: DateTime<Utc>,
    pub http_metadata: HttpMetadata,
}

impl BlobMetadata {
    /// The etag as it travels in an HTTP header (quoted).
    pub fn http_etag(&self) -> String {
        format!("\"{}\"", self.etag)
    }
}

/// Strip one pair of surrounding quotes, as S3-compatible stores return them.
pub fn unquote_etag(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
        .to_string()
}

/// A single satisfiable byte range: `offset` plus a non-zero `length`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub offset: u64,
    pub length: u64,
}

impl RangeSpec {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Inclusive last byte position.
    pub fn last_byte(&self) -> u64 {
        self.offset + self.length - 1
    }

    /// `Range` header form, for stores that speak HTTP.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.offset, self.last_byte())
    }

    /// `Content-Range` value against the full blob size.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.offset, self.last_byte(), total_size)
    }

    pub fn fits(&self, total_size: u64) -> bool {
        self.length > 0 && self.offset + self.length <= total_size
    }
}

/// Upper bound on what an upload reserves up front from its size hint.
pub const MAX_PREALLOCATION: usize = 8 * 1024 * 1024;

/// Request to store a blob
#[derive(Debug, Clone, Default)]
pub struct BlobPut {
    pub http_metadata: HttpMetadata,
    pub size_hint: Option<u64>,
}

impl BlobPut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.http_metadata.content_type = Some(content_type.into());
        self
    }

    pub fn with_cache_control<S: Into<String>>(mut self, cache_control: S) -> Self {
        self.http_metadata.cache_control = Some(cache_control.into());
        self
    }

    pub fn with_content_encoding<S: Into<String>>(mut self, encoding: S) -> Self {
        self.http_metadata.content_encoding = Some(encoding.into());
        self
    }

    pub fn with_content_language<S: Into<String>>(mut self, language: S) -> Self {
        self.http_metadata.content_language = Some(language.into());
        self
    }

    pub fn with_content_disposition<S: Into<String>>(mut self, disposition: S) -> Self {
        self.http_metadata.content_disposition = Some(disposition.into());
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.http_metadata.expires = Some(expires);
        self
    }

    /// Buffer capacity to reserve before reading the body. The hint comes
    /// from the client, so it is capped at [`MAX_PREALLOCATION`].
    pub fn initial_capacity(&self) -> usize {
        self.size_hint
            .map_or(0, |hint| hint.min(MAX_PREALLOCATION as u64) as usize)
    }

    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }
}

/// Listing request
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub limit: usize,
    pub prefix: Option<String>,
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            prefix: None,
            cursor: None,
        }
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_cursor<S: Into<String>>(mut self, cursor: S) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// One entry of a listing page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub etag: String,
    pub http_etag: String,
    pub uploaded: DateTime<Utc>,
    pub http_metadata: HttpMetadata,
}

impl From<&BlobMetadata> for ObjectSummary {
    fn from(meta: &BlobMetadata) -> Self {
        Self {
            key: meta.key.clone(),
            size: meta.size,
            etag: meta.etag.clone(),
            http_etag: meta.http_etag(),
            uploaded: meta.uploaded,
            http_metadata: meta.http_metadata.clone(),
        }
    }
}

/// A listing page, serialized as-is by the listing endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    pub objects: Vec<ObjectSummary>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub delimited_prefixes: Vec<String>,
}

/// Random slug used when an upload names no file
pub fn random_slug() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_renders_headers() {
        let range = RangeSpec::new(0, 2);
        assert_eq!(range.last_byte(), 1);
        assert_eq!(range.to_header(), "bytes=0-1");
        assert_eq!(range.content_range(3), "bytes 0-1/3");
        assert!(range.fits(3));
        assert!(!RangeSpec::new(2, 2).fits(3));
    }

    #[test]
    fn client_size_hint_is_capped() {
        assert_eq!(BlobPut::new().initial_capacity(), 0);
        assert_eq!(BlobPut::new().with_size_hint(4).initial_capacity(), 4);
        assert_eq!(
            BlobPut::new().with_size_hint(u64::MAX).initial_capacity(),
            MAX_PREALLOCATION
        );
        assert_eq!(
            BlobPut::new().with_size_hint(1_000_000_000_000).initial_capacity(),
            MAX_PREALLOCATION
        );
    }

    #[test]
    fn unquote_strips_one_pair() {
        assert_eq!(unquote_etag("\"abc\""), "abc");
        assert_eq!(unquote_etag("abc"), "abc");
        assert_eq!(unquote_etag(" \"\"abc\"\" "), "\"abc\"");
    }
}
