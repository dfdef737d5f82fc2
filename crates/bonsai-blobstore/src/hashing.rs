//! Hashing engines
//!
//! An engine maps bytes to an [`IdHash`] within a hash domain. The domain
//! is part of the hash input, so the same bytes never produce the same
//! digest as content and as a changeset.

use bonsai_types::{
    Blake3, BonsaiChangeset, ChangesetId, ContentId, HashAlgorithm, IdDomain, IdHash,
};

/// Bytes in, identifier out
pub trait HashingEngine: Send + Sync {
    /// Algorithm of every hash this engine produces
    fn algorithm(&self) -> HashAlgorithm;

    /// Hash `bytes` within `domain`
    fn hash(&self, domain: IdDomain, bytes: &[u8]) -> IdHash;

    fn content_id(&self, content: &[u8]) -> ContentId {
        ContentId::from_hash(self.hash(IdDomain::Content, content))
    }

    /// Id of already-encoded changeset bytes
    fn changeset_id_of_bytes(&self, canonical: &[u8]) -> ChangesetId {
        ChangesetId::from_hash(self.hash(IdDomain::Changeset, canonical))
    }

    fn changeset_id(&self, changeset: &BonsaiChangeset) -> ChangesetId {
        self.changeset_id_of_bytes(&changeset.to_canonical_bytes())
    }
}

/// Blake3 in key-derivation mode, one context string per domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blake3Engine;

impl Blake3Engine {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    const fn context(domain: IdDomain) -> &'static str {
        match domain {
            IdDomain::Content => "bonsai 2024-01-01 content v1",
            IdDomain::Changeset => "bonsai 2024-01-01 changeset v1",
        }
    }
}

impl HashingEngine for Blake3Engine {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Blake3
    }

    fn hash(&self, domain: IdDomain, bytes: &[u8]) -> IdHash {
        let mut hasher = blake3::Hasher::new_derive_key(Self::context(domain));
        hasher.update(bytes);
        IdHash::Blake3(Blake3::new(*hasher.finalize().as_bytes()))
    }
}
