use std::env;
use std::sync::Arc;

use anyhow::Result;
use snapbin_axum::{snapbin, SnapApp, SnapState};
use snapbin_blob::{BlobStore, MemoryBlobStore, S3CompatibleStore};
use snapbin_core::SnapConfig;
use tracing::{info, warn};

/// Assemble the gateway around an already constructed store.
pub fn build_with_store(config: SnapConfig, store: Arc<dyn BlobStore>) -> SnapApp {
    snapbin(SnapState::new(config, store))
}

/// Pick the bucket from the environment: an S3-compatible bucket when
/// `S3_BUCKET` is set, otherwise a process-local in-memory store.
pub async fn store_from_env() -> Result<Arc<dyn BlobStore>> {
    let bucket = env::var("S3_BUCKET").ok().filter(|b| !b.trim().is_empty());
    match bucket {
        Some(bucket) => {
            info!(%bucket, "using S3-compatible bucket");
            let store = S3CompatibleStore::from_env().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("S3_BUCKET not set, blobs are kept in memory and lost on exit");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
    }
}

pub async fn build(config: SnapConfig) -> Result<SnapApp> {
    let store = store_from_env().await?;
    Ok(build_with_store(config, store))
}
