//! Error types for changeset storage

use bonsai_types::{DecodeError, IdHash};

/// Errors raised by blobstores and the changeset store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Stored bytes are not a valid canonical changeset
    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: DecodeError,
    },

    /// Stored bytes do not hash to the id they were fetched by
    #[error("integrity mismatch for {key}: expected {expected}, bytes hash to {actual}")]
    IntegrityMismatch {
        key: String,
        expected: IdHash,
        actual: IdHash,
    },

    /// Stored bytes decode but do not re-encode identically
    #[error("bytes stored under {key} are not canonical")]
    NonCanonical { key: String },

    /// Failure inside a blobstore implementation
    #[error("blobstore backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Check if a retry could succeed
    ///
    /// Only backend failures are transient; everything else describes the
    /// stored bytes themselves.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
