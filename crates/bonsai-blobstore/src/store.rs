//! Content-addressed changeset and file content storage

use std::sync::Arc;

use bonsai_types::{BonsaiChangeset, ChangesetId, ContentId};

use crate::blobstore::Blobstore;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::hashing::{Blake3Engine, HashingEngine};

/// Stores changesets and file contents under their own ids
///
/// Writes encode, hash and put. Reads get, optionally re-hash to check the
/// bytes against the requested id, then decode. With
/// [`StoreConfig::verify_on_read`] set, the decoded changeset must also
/// re-encode to the fetched bytes.
#[derive(Clone)]
pub struct ChangesetStore {
    blobstore: Arc<dyn Blobstore>,
    hasher: Arc<dyn HashingEngine>,
    config: StoreConfig,
}

impl ChangesetStore {
    /// Store hashing with [`Blake3Engine`]
    #[must_use]
    pub fn new(blobstore: Arc<dyn Blobstore>, config: StoreConfig) -> Self {
        Self::with_hasher(blobstore, Arc::new(Blake3Engine::new()), config)
    }

    #[must_use]
    pub fn with_hasher(
        blobstore: Arc<dyn Blobstore>,
        hasher: Arc<dyn HashingEngine>,
        config: StoreConfig,
    ) -> Self {
        Self {
            blobstore,
            hasher,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn hasher(&self) -> &dyn HashingEngine {
        self.hasher.as_ref()
    }

    /// Store a changeset, returning its id
    ///
    /// # Errors
    /// Propagates blobstore failures
    pub async fn put_changeset(
        &self,
        changeset: &BonsaiChangeset,
    ) -> Result<ChangesetId, StoreError> {
        let bytes = changeset.to_canonical_bytes();
        let id = self.hasher.changeset_id_of_bytes(&bytes);
        let key = id.blobstore_key(&self.config.key_prefix);
        tracing::info!(%key, len = bytes.len(), "storing changeset");
        self.blobstore.put(key, bytes).await?;
        Ok(id)
    }

    /// Fetch and decode a changeset
    ///
    /// Returns `Ok(None)` if nothing is stored under the id.
    ///
    /// # Errors
    /// - [`StoreError::IntegrityMismatch`] if the bytes hash to another id
    /// - [`StoreError::Decode`] if the bytes are not a valid changeset
    /// - [`StoreError::NonCanonical`] if they do not re-encode identically
    pub async fn get_changeset(
        &self,
        id: &ChangesetId,
    ) -> Result<Option<BonsaiChangeset>, StoreError> {
        let key = id.blobstore_key(&self.config.key_prefix);
        let Some(bytes) = self.blobstore.get(&key).await? else {
            tracing::info!(%key, "changeset not found");
            return Ok(None);
        };
        tracing::info!(%key, len = bytes.len(), "fetched changeset");

        if self.config.verify_on_read {
            let actual = self.hasher.changeset_id_of_bytes(&bytes);
            if actual != *id {
                tracing::warn!(%key, actual = %actual, "changeset integrity mismatch");
                return Err(StoreError::IntegrityMismatch {
                    key,
                    expected: *id.hash(),
                    actual: *actual.hash(),
                });
            }
        }

        let changeset = BonsaiChangeset::from_canonical_bytes(&bytes, &self.config.decode)
            .map_err(|source| StoreError::Decode {
                key: key.clone(),
                source,
            })?;

        if self.config.verify_on_read && changeset.to_canonical_bytes() != bytes {
            tracing::warn!(%key, "stored changeset is not canonical");
            return Err(StoreError::NonCanonical { key });
        }
        Ok(Some(changeset))
    }

    /// Store file content, returning its id
    ///
    /// # Errors
    /// Propagates blobstore failures
    pub async fn put_content(&self, content: Vec<u8>) -> Result<ContentId, StoreError> {
        let id = self.hasher.content_id(&content);
        let key = id.blobstore_key(&self.config.key_prefix);
        tracing::info!(%key, len = content.len(), "storing content");
        self.blobstore.put(key, content).await?;
        Ok(id)
    }

    /// Fetch file content
    ///
    /// # Errors
    /// [`StoreError::IntegrityMismatch`] if verification is on and the
    /// bytes hash to another id
    pub async fn get_content(&self, id: &ContentId) -> Result<Option<Vec<u8>>, StoreError> {
        let key = id.blobstore_key(&self.config.key_prefix);
        let Some(content) = self.blobstore.get(&key).await? else {
            return Ok(None);
        };
        if self.config.verify_on_read {
            let actual = self.hasher.content_id(&content);
            if actual != *id {
                tracing::warn!(%key, actual = %actual, "content integrity mismatch");
                return Err(StoreError::IntegrityMismatch {
                    key,
                    expected: *id.hash(),
                    actual: *actual.hash(),
                });
            }
        }
        Ok(Some(content))
    }
}

impl std::fmt::Debug for ChangesetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesetStore")
            .field("algorithm", &self.hasher.algorithm())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
