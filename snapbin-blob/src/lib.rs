//! # snapbin-blob: blob storage and conditional retrieval
//!
//! `snapbin-blob` holds everything between an HTTP request for a file and the
//! bucket that stores it, without depending on any HTTP library:
//!
//! - **Stores**: the [`BlobStore`] trait with an S3-compatible backend and an
//!   in-memory one for development and tests
//! - **Preconditions**: parsing of `range` and the `if-*` headers into a
//!   [`ResolvedRequest`]
//! - **Response cache**: a request-keyed [`ResponseCache`] used cache-aside
//! - **Engine**: [`ConditionalFetch`], which picks the store calls, the status
//!   and the headers for a retrieval
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use snapbin_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = Arc::new(MemoryBlobStore::new());
//! store
//!     .put("2024/01/cat.txt", byte_stream("meow"), BlobPut::new().with_content_type("text/plain"))
//!     .await?;
//!
//! let engine = ConditionalFetch::new(store, FetchConfig::default());
//! let ctx = FetchCtx::new("req-1", Arc::new(MemoryResponseCache::new()), BackgroundTasks::new());
//!
//! let headers = RequestHeaders::new().with_range("bytes=0-1");
//! let response = engine
//!     .fetch(&ctx, FetchRequest::get("2024/01/cat.txt").with_headers(headers))
//!     .await?;
//!
//! assert_eq!(response.status, FetchStatus::PartialContent);
//! assert_eq!(response.header("content-range"), Some("bytes 0-1/4"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   HTTP handlers      │  ← snapbin-axum
//! ├──────────────────────┤
//! │   ConditionalFetch   │  ← decisions, status, headers, cache-aside
//! ├──────────────────────┤
//! │ BlobStore │ Response │
//! │           │ Cache    │  ← injected capabilities
//! └──────────────────────┘
//! ```

mod background;
pub mod cache;
mod config;
pub mod engine;
mod error;
mod memory_store;
pub mod preconditions;
mod response;
mod s3_store;
pub mod store;
mod types;

pub use background::BackgroundTasks;
pub use cache::{CacheKey, CachedResponse, MemoryResponseCache, ResponseCache};
pub use config::{
    FetchConfig, DEFAULT_CACHE_FILL_TIMEOUT, DEFAULT_CACHE_ORIGIN, DEFAULT_RESPONSE_CACHE_CONTROL,
};
pub use engine::{ConditionalFetch, FetchCtx, FetchRequest};
pub use error::{BlobError, BlobResult};
pub use memory_store::MemoryBlobStore;
pub use preconditions::{
    Conditional, EntityTag, EtagCondition, FetchMethod, IfRange, PreconditionParser,
    PreconditionSet, RangeError, RequestHeaders, ResolvedRequest,
};
pub use response::{FetchBody, FetchResponse, FetchStatus, ResponseHeaders};
pub use s3_store::{S3CompatibleStore, S3Config};
pub use store::{BlobKeyStrategy, BlobObject, BlobStore, DatedKeyStrategy, GetOptions, GetOutcome};
pub use types::{
    byte_stream, random_slug, unquote_etag, BlobMetadata, BlobPut, ByteStream, HttpMetadata,
    ListOptions, ListResult, ObjectSummary, RangeSpec, MAX_PREALLOCATION,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        byte_stream, BackgroundTasks, BlobError, BlobMetadata, BlobPut, BlobResult, BlobStore,
        ByteStream, ConditionalFetch, FetchConfig, FetchCtx, FetchRequest, FetchStatus,
        MemoryBlobStore, MemoryResponseCache, RequestHeaders, ResponseCache,
    };
}
