//! Snapshot storage gateway.
//!
//! Write-through persistence for the in-memory match store: a primary
//! redis cache backend with a permanent per-session fallback to a local
//! JSON file when the cache is unreachable at startup. Persistence errors
//! never abort collection; callers log and let the next flush retry.

pub mod cache;
pub mod file;

use crate::error::FeedError;
use crate::types::{Match, SnapshotMetadata};
use cache::CacheStorage;
use file::FileStorage;
use std::path::PathBuf;
use tracing::{info, warn};

/// Which backend a gateway ended up on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageType {
    Cache,
    File,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Cache => "cache",
            StorageType::File => "file",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub redis_url: String,
    /// Namespace for all cache keys (e.g. "oddsfeed:live")
    pub key_prefix: String,
    /// Snapshot document path for file mode
    pub file_path: PathBuf,
}

enum Backend {
    Cache(CacheStorage),
    File(FileStorage),
}

pub struct StorageGateway {
    backend: Backend,
}

impl StorageGateway {
    /// Try the cache store once; on failure fall back to file mode for the
    /// rest of the session. Never fails construction.
    pub async fn initialize(config: StorageConfig) -> Self {
        match CacheStorage::connect(&config.redis_url, &config.key_prefix).await {
            Ok(cache) => {
                info!("Storage gateway using cache store at {}", config.redis_url);
                Self {
                    backend: Backend::Cache(cache),
                }
            }
            Err(e) => {
                warn!(
                    "Cache store unavailable ({}), falling back to file storage at {:?}",
                    e, config.file_path
                );
                Self {
                    backend: Backend::File(FileStorage::new(&config.file_path)),
                }
            }
        }
    }

    /// File-mode gateway, used directly by tests and offline tooling.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File(FileStorage::new(path.into())),
        }
    }

    pub async fn save_snapshot(
        &self,
        matches: &[Match],
        meta: &SnapshotMetadata,
    ) -> Result<(), FeedError> {
        match &self.backend {
            Backend::Cache(cache) => cache.save(matches, meta).await,
            Backend::File(file) => file.save(matches, meta),
        }
    }

    pub async fn load_snapshot(&self) -> Result<Vec<Match>, FeedError> {
        match &self.backend {
            Backend::Cache(cache) => cache.load().await,
            Backend::File(file) => file.load(),
        }
    }

    pub async fn clear_all(&self) -> Result<(), FeedError> {
        match &self.backend {
            Backend::Cache(cache) => cache.clear().await,
            Backend::File(file) => file.clear(),
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match &self.backend {
            Backend::Cache(_) => StorageType::Cache,
            Backend::File(_) => StorageType::File,
        }
    }

    pub async fn is_cache_connected(&self) -> bool {
        match &self.backend {
            Backend::Cache(cache) => cache.ping().await,
            Backend::File(_) => false,
        }
    }
}
