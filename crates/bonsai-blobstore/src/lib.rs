//! Hashing and storage boundaries for bonsai changesets
//!
//! [`HashingEngine`] turns canonical bytes into domain-typed ids,
//! [`Blobstore`] keeps bytes under string keys, and [`ChangesetStore`]
//! ties the two together with read-side verification.
//!
//! ```
//! use std::sync::Arc;
//!
//! use bonsai_blobstore::{ChangesetStore, MemBlobstore, StoreConfig};
//! use bonsai_types::BonsaiChangesetMut;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ChangesetStore::new(Arc::new(MemBlobstore::new()), StoreConfig::default());
//! let cs = BonsaiChangesetMut::new().with_message("initial").freeze()?;
//! let id = store.put_changeset(&cs).await?;
//! assert_eq!(store.get_changeset(&id).await?, Some(cs));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod blobstore;
mod config;
mod error;
mod hashing;
mod store;

pub use blobstore::{Blobstore, MemBlobstore};
pub use config::StoreConfig;
pub use error::StoreError;
pub use hashing::{Blake3Engine, HashingEngine};
pub use store::ChangesetStore;
