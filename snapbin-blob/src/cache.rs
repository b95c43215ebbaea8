//! Request-keyed response cache used cache-aside by the fetch engine.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::BlobResult;

/// Canonical request identity: method plus absolute object URL.
/// Query strings and ranges never take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    pub fn for_object(origin: &str, key: &str) -> Self {
        Self {
            method: "GET".to_string(),
            url: format!(
                "{}/{}",
                origin.trim_end_matches('/'),
                key.trim_start_matches('/')
            ),
        }
    }
}

/// Snapshot of an assembled response
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Unquoted validator, kept for local revalidation
    pub etag: String,
    pub uploaded: DateTime<Utc>,
}

impl CachedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn match_response(&self, key: &CacheKey) -> BlobResult<Option<CachedResponse>>;

    async fn put(&self, key: CacheKey, response: CachedResponse, ttl: Duration) -> BlobResult<()>;

    /// Returns whether an entry was removed.
    async fn delete(&self, key: &CacheKey) -> BlobResult<bool>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: Instant,
}

/// In-process [`ResponseCache`] with per-entry expiry
#[derive(Debug, Default)]
pub struct MemoryResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn match_response(&self, key: &CacheKey) -> BlobResult<Option<CachedResponse>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.response.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn put(&self, key: CacheKey, response: CachedResponse, ttl: Duration) -> BlobResult<()> {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key, CacheEntry { response, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> BlobResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

/// Freshness lifetime granted by a `cache-control` value. `None` means the
/// response must not be stored.
pub fn ttl_from_cache_control(value: &str) -> Option<Duration> {
    let mut max_age = None;
    let mut shared_max_age = None;

    for directive in value.split(',') {
        let directive = directive.trim().to_ascii_lowercase();
        let (name, arg) = match directive.split_once('=') {
            Some((name, arg)) => (name.trim().to_string(), Some(arg.trim().trim_matches('"').to_string())),
            None => (directive.clone(), None),
        };
        match name.as_str() {
            "no-store" | "private" | "no-cache" => return None,
            "max-age" => max_age = arg.and_then(|a| a.parse::<u64>().ok()),
            "s-maxage" => shared_max_age = arg.and_then(|a| a.parse::<u64>().ok()),
            _ => {}
        }
    }

    shared_max_age
        .or(max_age)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
