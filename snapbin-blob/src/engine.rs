use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn, Instrument};

use crate::cache::ttl_from_cache_control;
use crate::preconditions::{PreconditionParser, PreconditionSet, RequestHeaders, Verdict};
use crate::{
    BackgroundTasks, BlobMetadata, BlobResult, BlobStore, ByteStream, CacheKey, CachedResponse,
    FetchBody, FetchConfig, FetchMethod, FetchResponse, FetchStatus, GetOptions, GetOutcome,
    RangeSpec, ResponseCache, ResponseHeaders,
};

/// Per-request execution context: the injected response cache plus the
/// tracker that owns work outliving the request.
#[derive(Clone)]
pub struct FetchCtx {
    pub request_id: String,
    pub cache: Arc<dyn ResponseCache>,
    pub tasks: BackgroundTasks,
}

impl FetchCtx {
    pub fn new(request_id: impl Into<String>, cache: Arc<dyn ResponseCache>, tasks: BackgroundTasks) -> Self {
        Self {
            request_id: request_id.into(),
            cache,
            tasks,
        }
    }
}

/// A retrieval request as the engine sees it
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: FetchMethod,
    pub key: String,
    pub headers: RequestHeaders,
}

impl FetchRequest {
    pub fn get(key: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::Get,
            key: key.into(),
            headers: RequestHeaders::default(),
        }
    }

    pub fn head(key: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::Head,
            ..Self::get(key)
        }
    }

    pub fn with_headers(mut self, headers: RequestHeaders) -> Self {
        self.headers = headers;
        self
    }
}

/// Response plus the metadata it was assembled from, when there was one.
struct Assembled {
    response: FetchResponse,
    metadata: Option<BlobMetadata>,
}

impl Assembled {
    fn terminal(status: FetchStatus) -> Self {
        Self {
            response: FetchResponse::empty(status),
            metadata: None,
        }
    }
}

/// The conditional-and-range retrieval engine.
///
/// Holds no mutable state of its own; the store is shared and the cache
/// travels with each request's [`FetchCtx`].
#[derive(Clone)]
pub struct ConditionalFetch {
    store: Arc<dyn BlobStore>,
    config: FetchConfig,
}

impl ConditionalFetch {
    pub fn new(store: Arc<dyn BlobStore>, config: FetchConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Canonical cache identity of an object.
    pub fn cache_key(&self, key: &str) -> CacheKey {
        CacheKey::for_object(&self.config.cache_origin, key)
    }

    #[instrument(
        name = "fetch",
        skip_all,
        fields(request_id = %ctx.request_id, key = %request.key, method = ?request.method)
    )]
    pub async fn fetch(&self, ctx: &FetchCtx, request: FetchRequest) -> BlobResult<FetchResponse> {
        let uses_cache = self.config.cache_enabled
            && request.method == FetchMethod::Get
            && request.headers.range.is_none();
        let cache_key = self.cache_key(&request.key);

        if uses_cache {
            match ctx.cache.match_response(&cache_key).await {
                Ok(Some(hit)) => {
                    debug!(url = %cache_key.url, "response cache hit");
                    return Ok(self.serve_cached(hit, &request.headers));
                }
                Ok(None) => debug!(url = %cache_key.url, "response cache miss"),
                Err(err) => warn!(error = %err, "response cache lookup failed"),
            }
        }

        let assembled = self.fetch_from_store(&request).await?;
        debug!(status = assembled.response.status.code(), "assembled response");

        match assembled.metadata {
            Some(metadata) if uses_cache && assembled.response.status.is_cacheable() => {
                Ok(self.populate_cache(ctx, cache_key, assembled.response, metadata))
            }
            _ => Ok(assembled.response),
        }
    }

    async fn fetch_from_store(&self, request: &FetchRequest) -> BlobResult<Assembled> {
        let key = request.key.as_str();

        let current = if PreconditionParser::needs_metadata(request.method, &request.headers) {
            match self.store.head(key).await? {
                Some(meta) => Some(meta),
                None => return Ok(Assembled::terminal(FetchStatus::NotFound)),
            }
        } else {
            None
        };

        let resolved =
            match PreconditionParser::resolve(request.method, key, &request.headers, current.as_ref()) {
                Ok(resolved) => resolved,
                Err(err) => {
                    debug!(error = %err, "range rejected");
                    return Ok(Assembled::terminal(FetchStatus::RangeNotSatisfiable));
                }
            };
        let preconditions = &resolved.preconditions;

        let mut candidate = None;
        if preconditions.has_match_conditions() {
            let options = GetOptions::new()
                .with_range(resolved.range)
                .only_if(preconditions.match_conditional());
            match self.store.get(key, options).await? {
                GetOutcome::Found(object) => candidate = Some(object),
                GetOutcome::PreconditionFailed(_) => {
                    return Ok(Assembled::terminal(FetchStatus::PreconditionFailed))
                }
                GetOutcome::NotFound => return Ok(Assembled::terminal(FetchStatus::NotFound)),
            }
        } else if preconditions.has_none_match_conditions() {
            let options = GetOptions::new()
                .with_range(resolved.range)
                .only_if(preconditions.none_match_conditional());
            match self.store.get(key, options).await? {
                GetOutcome::Found(object) => candidate = Some(object),
                GetOutcome::PreconditionFailed(meta) => return Ok(self.not_modified(meta)),
                GetOutcome::NotFound => return Ok(Assembled::terminal(FetchStatus::NotFound)),
            }
        }

        let (metadata, body, served) = match candidate {
            Some(object) => (object.metadata, Some(object.body), object.range),
            None if request.method == FetchMethod::Head => match self.store.head(key).await? {
                Some(meta) => (meta, None, None),
                None => return Ok(Assembled::terminal(FetchStatus::NotFound)),
            },
            None => {
                let options = GetOptions::new().with_range(resolved.range);
                match self.store.get(key, options).await? {
                    GetOutcome::Found(object) => (object.metadata, Some(object.body), object.range),
                    GetOutcome::PreconditionFailed(_) => {
                        return Ok(Assembled::terminal(FetchStatus::PreconditionFailed))
                    }
                    GetOutcome::NotFound => return Ok(Assembled::terminal(FetchStatus::NotFound)),
                }
            }
        };

        // The blob may have shrunk between `head` and `get`.
        let range = match (resolved.range, served) {
            (Some(_), Some(served)) if served.fits(metadata.size) => Some(served),
            (Some(_), _) => return Ok(Assembled::terminal(FetchStatus::RangeNotSatisfiable)),
            (None, _) => None,
        };

        Ok(self.assemble(request.method, metadata, body, range))
    }

    fn assemble(
        &self,
        method: FetchMethod,
        metadata: BlobMetadata,
        body: Option<ByteStream>,
        range: Option<RangeSpec>,
    ) -> Assembled {
        let status = if metadata.size == 0 {
            FetchStatus::NoContent
        } else if range.is_some() {
            FetchStatus::PartialContent
        } else {
            FetchStatus::Ok
        };

        let headers = ResponseHeaders::new()
            .entity(&metadata, range, &self.config.default_cache_control)
            .build();

        let body = match (method, status, body) {
            (FetchMethod::Head, _, _) | (_, FetchStatus::NoContent, _) | (_, _, None) => FetchBody::Empty,
            (_, _, Some(stream)) => FetchBody::Stream(stream),
        };

        Assembled {
            response: FetchResponse { status, headers, body },
            metadata: Some(metadata),
        }
    }

    fn not_modified(&self, metadata: BlobMetadata) -> Assembled {
        let headers = ResponseHeaders::new()
            .validators(&metadata, &self.config.default_cache_control)
            .build();
        Assembled {
            response: FetchResponse {
                status: FetchStatus::NotModified,
                headers,
                body: FetchBody::Empty,
            },
            metadata: Some(metadata),
        }
    }

    /// Revalidate a cached response locally; the store is never touched.
    fn serve_cached(&self, hit: CachedResponse, headers: &RequestHeaders) -> FetchResponse {
        match PreconditionSet::from_headers(headers).evaluate(&hit.etag, hit.uploaded) {
            Verdict::PreconditionFailed => FetchResponse::empty(FetchStatus::PreconditionFailed),
            Verdict::NotModified => FetchResponse {
                status: FetchStatus::NotModified,
                headers: hit
                    .headers
                    .into_iter()
                    .filter(|(name, _)| {
                        matches!(
                            name.to_ascii_lowercase().as_str(),
                            "etag" | "last-modified" | "cache-control" | "expires"
                        )
                    })
                    .collect(),
                body: FetchBody::Empty,
            },
            Verdict::Proceed => {
                let status = FetchStatus::from_code(hit.status).unwrap_or(FetchStatus::Ok);
                let body = if status == FetchStatus::NoContent {
                    FetchBody::Empty
                } else {
                    FetchBody::Full(hit.body)
                };
                FetchResponse {
                    status,
                    headers: hit.headers,
                    body,
                }
            }
        }
    }

    /// Hand the response back with its body teed into a snapshot; a tracked
    /// background task writes the snapshot once the client has read it all.
    fn populate_cache(
        &self,
        ctx: &FetchCtx,
        cache_key: CacheKey,
        response: FetchResponse,
        metadata: BlobMetadata,
    ) -> FetchResponse {
        let Some(ttl) = response.header("cache-control").and_then(ttl_from_cache_control) else {
            debug!("response is not storable");
            return response;
        };

        let FetchResponse { status, headers, body } = response;
        let (tx, rx) = oneshot::channel::<Bytes>();
        let body = match body {
            FetchBody::Stream(stream) => FetchBody::Stream(tee_body(stream, tx)),
            FetchBody::Full(bytes) => {
                let _ = tx.send(bytes.clone());
                FetchBody::Full(bytes)
            }
            FetchBody::Empty => {
                let _ = tx.send(Bytes::new());
                FetchBody::Empty
            }
        };

        let cache = ctx.cache.clone();
        let snapshot_headers = headers.clone();
        let fill_timeout = self.config.cache_fill_timeout;
        let span = tracing::debug_span!("cache_put", url = %cache_key.url);
        ctx.tasks.wait_until(
            async move {
                let body = match tokio::time::timeout(fill_timeout, rx).await {
                    Ok(Ok(body)) => body,
                    Ok(Err(_)) => {
                        debug!("body not fully read, cache population abandoned");
                        return;
                    }
                    Err(_) => {
                        debug!(
                            timeout_ms = fill_timeout.as_millis() as u64,
                            "body still unread, cache population abandoned"
                        );
                        return;
                    }
                };
                let cached = CachedResponse {
                    status: status.code(),
                    headers: snapshot_headers,
                    body,
                    etag: metadata.etag,
                    uploaded: metadata.uploaded,
                };
                match cache.put(cache_key, cached, ttl).await {
                    Ok(()) => debug!(ttl_secs = ttl.as_secs(), "response cached"),
                    Err(err) => warn!(error = %err, "response cache write failed"),
                }
            }
            .instrument(span),
        );

        FetchResponse { status, headers, body }
    }
}

/// Pass chunks through while buffering a copy; the copy is only sent once
/// the stream ends cleanly.
fn tee_body(mut stream: ByteStream, snapshot: oneshot::Sender<Bytes>) -> ByteStream {
    Box::pin(async_stream::stream! {
        let mut buffer = BytesMut::new();
        let mut failed = false;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => {
                    buffer.extend_from_slice(&chunk);
                    yield Ok(chunk);
                }
                Err(err) => {
                    failed = true;
                    yield Err(err);
                    break;
                }
            }
        }
        if !failed {
            let _ = snapshot.send(buffer.freeze());
        }
    })
}
