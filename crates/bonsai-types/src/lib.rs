//! Bonsai changeset model
//!
//! Canonical, content-addressed changesets shared by two version-control
//! front ends.
//!
//! # Core Concepts
//!
//! - [`ContentId`] / [`ChangesetId`]: typed 32-byte identifiers in separate
//!   hash domains
//! - [`TreePath`]: byte-string paths ordered like a depth-first tree walk
//! - [`DateTime`]: timestamp with a bounded timezone offset
//! - [`FileChange`] / [`FileChangeOpt`]: per-path additions and deletions
//! - [`BonsaiChangeset`]: the immutable, path-conflict-free aggregate
//! - [`codec`]: the canonical byte encoding that identity is derived from
//!
//! # Example
//!
//! ```rust
//! use bonsai_types::{BonsaiChangesetMut, ContentId, FileChange, FileType, TreePath};
//!
//! let content = ContentId::from_bytes(&[1u8; 32])?;
//! let cs = BonsaiChangesetMut::new()
//!     .with_message("initial import")
//!     .with_file_change(
//!         TreePath::new("src/main.rs")?,
//!         FileChange::new(content, FileType::Regular, 42, None)?,
//!     )
//!     .freeze()?;
//!
//! let bytes = cs.to_canonical_bytes();
//! assert_eq!(bytes[0], bonsai_types::codec::FORMAT_VERSION);
//! # Ok::<(), bonsai_types::BonsaiError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod changeset;
pub mod codec;
mod datetime;
mod error;
mod file_change;
mod hash;
mod path;
mod typed_hash;

pub use changeset::{BonsaiChangeset, BonsaiChangesetMut};
pub use codec::{Canonical, DecodeConfig, DecodeError};
pub use datetime::{DateTime, MAX_TZ_OFFSET_SECS};
pub use error::BonsaiError;
pub use file_change::{CopyInfo, FileChange, FileChangeOpt, FileType};
pub use hash::{Blake3, HashAlgorithm, IdHash, Sha1, BLAKE3_LEN, SHA1_LEN};
pub use path::{check_pcf, check_pcf_marked, check_pcf_sorted, EntryPath, PathElement, TreePath};
pub use typed_hash::{
    ChangesetDomain, ChangesetId, ContentDomain, ContentId, Domain, IdDomain, RawId, TypedId,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
