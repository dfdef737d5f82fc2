//! Key-value blob storage

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;

/// Byte storage keyed by string
///
/// Implementations must be safe to share across tasks. Values are
/// immutable once written: putting the same key twice stores the same bytes
/// for content-addressed keys.
#[async_trait]
pub trait Blobstore: Send + Sync {
    /// Fetch the bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: String, value: Vec<u8>) -> Result<(), StoreError>;

    async fn is_present(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// In-process blobstore backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemBlobstore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemBlobstore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl Blobstore for MemBlobstore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: String, value: Vec<u8>) -> Result<(), StoreError> {
        self.blobs.insert(key, value);
        Ok(())
    }

    async fn is_present(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.contains_key(key))
    }
}
