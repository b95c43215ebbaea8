use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use indexmap::IndexMap;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::{
    byte_stream, BlobError, BlobMetadata, BlobObject, BlobPut, BlobResult, BlobStore, ByteStream,
    GetOptions, GetOutcome, ListOptions, ListResult, ObjectSummary,
};

#[derive(Debug, Clone)]
struct StoredBlob {
    metadata: BlobMetadata,
    data: Bytes,
}

/// In-process store for development and tests.
///
/// Listing preserves insertion order; re-putting a key keeps its position.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<IndexMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a blob with a fixed upload time (seeding fixtures).
    pub fn insert_at(&self, key: &str, data: impl Into<Bytes>, put: BlobPut, uploaded: DateTime<Utc>) -> BlobMetadata {
        let data = data.into();
        let metadata = BlobMetadata {
            key: key.to_string(),
            size: data.len() as u64,
            etag: content_etag(&data),
            uploaded,
            http_metadata: put.http_metadata,
        };
        self.blobs.write().insert(
            key.to_string(),
            StoredBlob {
                metadata: metadata.clone(),
                data,
            },
        );
        metadata
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    fn snapshot(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.read().get(key).cloned()
    }
}

/// First 32 hex chars of the SHA-256 of the content.
fn content_etag(data: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(data));
    digest[..32].to_string()
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn head(&self, key: &str) -> BlobResult<Option<BlobMetadata>> {
        Ok(self.snapshot(key).map(|blob| blob.metadata))
    }

    async fn get(&self, key: &str, options: GetOptions) -> BlobResult<GetOutcome> {
        let Some(blob) = self.snapshot(key) else {
            return Ok(GetOutcome::NotFound);
        };

        if let Some(only_if) = &options.only_if {
            if !only_if.is_satisfied_by(&blob.metadata) {
                return Ok(GetOutcome::PreconditionFailed(blob.metadata));
            }
        }

        let size = blob.data.len() as u64;
        let (body, range) = match options.range {
            Some(range) if range.length > 0 && range.offset < size => {
                let end = (range.offset + range.length).min(size);
                let served = crate::RangeSpec::new(range.offset, end - range.offset);
                (blob.data.slice(range.offset as usize..end as usize), Some(served))
            }
            Some(_) => (Bytes::new(), None),
            None => (blob.data, None),
        };

        Ok(GetOutcome::Found(BlobObject {
            metadata: blob.metadata,
            body: byte_stream(body),
            range,
        }))
    }

    async fn put(&self, key: &str, mut stream: ByteStream, put: BlobPut) -> BlobResult<BlobMetadata> {
        let mut buffer = BytesMut::with_capacity(put.initial_capacity());
        while let Some(chunk) = stream.try_next().await? {
            buffer.extend_from_slice(&chunk);
        }
        if key.is_empty() {
            return Err(BlobError::invalid("blob key must not be empty"));
        }
        Ok(self.insert_at(key, buffer.freeze(), put, Utc::now()))
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.blobs.write().shift_remove(key);
        Ok(())
    }

    async fn list(&self, options: ListOptions) -> BlobResult<ListResult> {
        let offset = match options.cursor.as_deref() {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| BlobError::invalid(format!("invalid cursor: {cursor}")))?,
            None => 0,
        };

        let blobs = self.blobs.read();
        let mut matching = blobs
            .values()
            .filter(|blob| match &options.prefix {
                Some(prefix) => blob.metadata.key.starts_with(prefix.as_str()),
                None => true,
            })
            .skip(offset);

        let objects: Vec<ObjectSummary> = matching
            .by_ref()
            .take(options.limit)
            .map(|blob| ObjectSummary::from(&blob.metadata))
            .collect();
        let truncated = matching.next().is_some();
        let cursor = truncated.then(|| (offset + objects.len()).to_string());

        Ok(ListResult {
            objects,
            truncated,
            cursor,
            delimited_prefixes: Vec::new(),
        })
    }
}
