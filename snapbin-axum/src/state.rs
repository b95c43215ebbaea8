use std::sync::Arc;

use axum::http::HeaderMap;
use snapbin_blob::{
    BackgroundTasks, BlobKeyStrategy, BlobStore, ConditionalFetch, DatedKeyStrategy, FetchConfig,
    FetchCtx, MemoryResponseCache, ResponseCache,
};
use snapbin_core::SnapConfig;

/// Shared handler state. Every collaborator is internally synchronized;
/// cloning is cheap.
#[derive(Clone)]
pub struct SnapState {
    pub config: Arc<SnapConfig>,
    pub store: Arc<dyn BlobStore>,
    pub cache: Arc<dyn ResponseCache>,
    pub keys: Arc<dyn BlobKeyStrategy>,
    pub engine: ConditionalFetch,
    pub tasks: BackgroundTasks,
}

impl SnapState {
    pub fn new(config: SnapConfig, store: Arc<dyn BlobStore>) -> Self {
        let fetch_config = FetchConfig::new()
            .with_default_cache_control(config.cache_control.clone())
            .with_cache_origin(config.cache_origin.clone());
        let engine = ConditionalFetch::new(Arc::clone(&store), fetch_config);

        Self {
            config: Arc::new(config),
            store,
            cache: Arc::new(MemoryResponseCache::new()),
            keys: Arc::new(DatedKeyStrategy),
            engine,
            tasks: BackgroundTasks::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_key_strategy(mut self, keys: Arc<dyn BlobKeyStrategy>) -> Self {
        self.keys = keys;
        self
    }

    /// Execution context for one retrieval, tagged with the request id.
    pub fn fetch_ctx(&self, headers: &HeaderMap) -> FetchCtx {
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        FetchCtx::new(request_id, Arc::clone(&self.cache), self.tasks.clone())
    }
}
