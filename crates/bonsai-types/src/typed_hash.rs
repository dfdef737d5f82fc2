//! Domain-typed identifiers
//!
//! [`ContentId`] and [`ChangesetId`] share one representation ([`IdHash`])
//! but live in separate hash domains. They are distinct nominal types: the
//! compiler rejects one where the other is expected, and there is no
//! conversion between them. Raw bytes only become a typed id through
//! [`TypedId::from_raw`], which checks the declared domain.
//!
//! ```compile_fail
//! use bonsai_types::{ChangesetId, ContentId};
//!
//! fn parent_of(id: ChangesetId) -> ChangesetId {
//!     id
//! }
//!
//! let content = ContentId::from_bytes(&[7u8; 32]).unwrap();
//! parent_of(content);
//! ```
//!
//! Moving between domains always goes through [`RawId`]:
//!
//! ```
//! use bonsai_types::{BonsaiError, ChangesetId, ContentId};
//!
//! let content = ContentId::from_bytes(&[7u8; 32])?;
//! assert!(matches!(
//!     ChangesetId::from_raw(content.into_raw()),
//!     Err(BonsaiError::TypeMismatch { .. })
//! ));
//! # Ok::<(), BonsaiError>(())
//! ```

use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BonsaiError;
use crate::hash::{Blake3, HashAlgorithm, IdHash};

/// Hash domains an identifier can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdDomain {
    Content,
    Changeset,
}

impl IdDomain {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Changeset => "changeset",
        }
    }
}

impl Display for IdDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker trait for hash domains
///
/// Sealed: the set of domains is fixed by this crate.
pub trait Domain: private::Sealed + Send + Sync + 'static {
    const DOMAIN: IdDomain;
}

mod private {
    pub trait Sealed {}
}

/// Domain of file contents
#[derive(Debug)]
pub enum ContentDomain {}

/// Domain of bonsai changesets
#[derive(Debug)]
pub enum ChangesetDomain {}

impl private::Sealed for ContentDomain {}
impl private::Sealed for ChangesetDomain {}

impl Domain for ContentDomain {
    const DOMAIN: IdDomain = IdDomain::Content;
}

impl Domain for ChangesetDomain {
    const DOMAIN: IdDomain = IdDomain::Changeset;
}

/// Identifier of a file's contents
pub type ContentId = TypedId<ContentDomain>;

/// Identifier of a bonsai changeset
pub type ChangesetId = TypedId<ChangesetDomain>;

/// Content-addressed identifier tagged with its hash domain
///
/// # Invariants
/// - Equality and ordering are byte-wise over the underlying hash
/// - Never converts into a `TypedId` of another domain
pub struct TypedId<D: Domain> {
    hash: IdHash,
    _domain: PhantomData<fn() -> D>,
}

impl<D: Domain> TypedId<D> {
    /// Wrap a hash the caller already knows belongs to this domain
    ///
    /// Use at trust boundaries only, e.g. where the hashing engine has
    /// just produced the hash for a value of this domain.
    #[inline]
    #[must_use]
    pub const fn from_hash(hash: IdHash) -> Self {
        Self {
            hash,
            _domain: PhantomData,
        }
    }

    /// Build from exactly 32 Blake3 bytes
    ///
    /// # Errors
    /// Returns [`BonsaiError::InvalidLength`] for any other length
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BonsaiError> {
        Blake3::from_slice(bytes).map(|hash| Self::from_hash(IdHash::Blake3(hash)))
    }

    /// Accept an untyped id whose domain was declared by the producer
    ///
    /// # Errors
    /// Returns [`BonsaiError::TypeMismatch`] if the declared domain is not `D`
    pub fn from_raw(raw: RawId) -> Result<Self, BonsaiError> {
        if raw.domain != D::DOMAIN {
            return Err(BonsaiError::TypeMismatch {
                expected: D::DOMAIN,
                actual: raw.domain,
            });
        }
        Ok(Self::from_hash(raw.hash))
    }

    /// Forget the static domain, keeping it as a runtime tag
    #[inline]
    #[must_use]
    pub const fn into_raw(self) -> RawId {
        RawId {
            domain: D::DOMAIN,
            hash: self.hash,
        }
    }

    #[inline]
    #[must_use]
    pub const fn domain(&self) -> IdDomain {
        D::DOMAIN
    }

    #[inline]
    #[must_use]
    pub const fn hash(&self) -> &IdHash {
        &self.hash
    }

    #[inline]
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.hash.algorithm()
    }

    /// Borrow the digest bytes without copying
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.hash.as_bytes()
    }

    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        self.hash.short()
    }

    /// Key under which the blobstore keeps the value this id names
    ///
    /// Format: `<prefix>.<domain>.<algorithm>.<hex>`
    #[must_use]
    pub fn blobstore_key(&self, prefix: &str) -> String {
        format!(
            "{prefix}.{}.{}.{}",
            D::DOMAIN,
            self.hash.algorithm(),
            self.hash
        )
    }
}

// Manual impls: derives would demand the same traits from the uninhabited
// marker types.

impl<D: Domain> Clone for TypedId<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: Domain> Copy for TypedId<D> {}

impl<D: Domain> PartialEq for TypedId<D> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl<D: Domain> Eq for TypedId<D> {}

impl<D: Domain> PartialOrd for TypedId<D> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<D: Domain> Ord for TypedId<D> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl<D: Domain> Hash for TypedId<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl<D: Domain> Debug for TypedId<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match D::DOMAIN {
            IdDomain::Content => write!(f, "ContentId({})", self.hash),
            IdDomain::Changeset => write!(f, "ChangesetId({})", self.hash),
        }
    }
}

impl<D: Domain> Display for TypedId<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.hash, f)
    }
}

impl<D: Domain> FromStr for TypedId<D> {
    type Err = BonsaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IdHash>().map(Self::from_hash)
    }
}

impl<D: Domain> AsRef<[u8]> for TypedId<D> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<D: Domain> Serialize for TypedId<D> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match &self.hash {
            IdHash::Blake3(hash) => hash.serialize(serializer),
        }
    }
}

impl<'de, D: Domain> Deserialize<'de> for TypedId<D> {
    fn deserialize<De>(deserializer: De) -> Result<Self, De::Error>
    where
        De: serde::Deserializer<'de>,
    {
        Blake3::deserialize(deserializer).map(|hash| Self::from_hash(IdHash::Blake3(hash)))
    }
}

/// Identifier with a runtime domain tag
///
/// What a boundary that handles raw bytes plus a declared kind passes
/// around before it knows which typed id it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawId {
    pub domain: IdDomain,
    pub hash: IdHash,
}

impl RawId {
    /// # Errors
    /// Returns [`BonsaiError::InvalidLength`] if `bytes` do not fit `algorithm`
    pub fn from_parts(
        domain: IdDomain,
        algorithm: HashAlgorithm,
        bytes: &[u8],
    ) -> Result<Self, BonsaiError> {
        Ok(Self {
            domain,
            hash: IdHash::from_parts(algorithm, bytes)?,
        })
    }
}
