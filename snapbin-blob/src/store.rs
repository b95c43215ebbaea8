use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use crate::{BlobMetadata, BlobPut, BlobResult, ByteStream, Conditional, ListOptions, ListResult, RangeSpec};

/// Core blob storage operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Metadata only; `None` when the key is absent.
    async fn head(&self, key: &str) -> BlobResult<Option<BlobMetadata>>;

    /// Read a blob, optionally a single range of it, optionally only if the
    /// `only_if` conditions hold against the current object.
    async fn get(&self, key: &str, options: GetOptions) -> BlobResult<GetOutcome>;

    /// Store a blob from a stream, replacing any previous one under `key`.
    async fn put(&self, key: &str, stream: ByteStream, put: BlobPut) -> BlobResult<BlobMetadata>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    async fn list(&self, options: ListOptions) -> BlobResult<ListResult>;
}

/// Options for [`BlobStore::get`]
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub range: Option<RangeSpec>,
    pub only_if: Option<Conditional>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, range: Option<RangeSpec>) -> Self {
        self.range = range;
        self
    }

    pub fn only_if(mut self, conditional: Conditional) -> Self {
        self.only_if = if conditional.is_empty() { None } else { Some(conditional) };
        self
    }
}

/// A blob with its body
pub struct BlobObject {
    pub metadata: BlobMetadata,
    pub body: ByteStream,
    /// The slice actually returned, when a range was requested
    pub range: Option<RangeSpec>,
}

impl std::fmt::Debug for BlobObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobObject")
            .field("metadata", &self.metadata)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Result of a [`BlobStore::get`]
#[derive(Debug)]
pub enum GetOutcome {
    Found(BlobObject),
    /// The blob exists but `only_if` did not hold: metadata without a body.
    PreconditionFailed(BlobMetadata),
    NotFound,
}

/// Strategy for naming uploads that arrive without a filename
pub trait BlobKeyStrategy: Send + Sync {
    fn object_key(&self, slug: &str, now: DateTime<Utc>) -> String;
}

/// `{year}/{month}/{slug}`
#[derive(Debug, Clone, Default)]
pub struct DatedKeyStrategy;

impl BlobKeyStrategy for DatedKeyStrategy {
    fn object_key(&self, slug: &str, now: DateTime<Utc>) -> String {
        format!("{:04}/{:02}/{}", now.year(), now.month(), slug)
    }
}
