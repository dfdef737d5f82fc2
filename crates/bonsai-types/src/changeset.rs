//! The bonsai changeset aggregate
//!
//! [`BonsaiChangesetMut`] is the open builder a commit or translation step
//! fills in. [`BonsaiChangesetMut::freeze`] validates it and produces the
//! immutable [`BonsaiChangeset`], whose identity is derived from its
//! canonical encoding alone.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::codec::{self, DecodeConfig, DecodeError};
use crate::datetime::DateTime;
use crate::error::BonsaiError;
use crate::file_change::FileChangeOpt;
use crate::path::{self, TreePath};
use crate::typed_hash::ChangesetId;

/// Changeset under construction
///
/// Fields are public and maps are unordered: nothing here reaches the
/// encoding until [`Self::freeze`] succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonsaiChangesetMut {
    /// Parents in the order the ordered-parent source system presents them
    pub parents: Vec<ChangesetId>,
    pub author: Option<String>,
    pub author_date: Option<DateTime>,
    pub committer: Option<String>,
    pub committer_date: Option<DateTime>,
    /// Required
    pub message: Option<String>,
    pub extra: HashMap<String, String>,
    pub file_changes: HashMap<TreePath, FileChangeOpt>,
}

impl BonsaiChangesetMut {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parent(mut self, parent: ChangesetId) -> Self {
        self.parents.push(parent);
        self
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>, date: Option<DateTime>) -> Self {
        self.author = Some(author.into());
        self.author_date = date;
        self
    }

    #[must_use]
    pub fn with_committer(mut self, committer: impl Into<String>, date: Option<DateTime>) -> Self {
        self.committer = Some(committer.into());
        self.committer_date = date;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_file_change(mut self, path: TreePath, change: impl Into<FileChangeOpt>) -> Self {
        self.file_changes.insert(path, change.into());
        self
    }

    /// Validate and freeze into an immutable changeset
    ///
    /// # Errors
    /// - [`BonsaiError::MissingRequiredField`] if `message` is unset
    /// - [`BonsaiError::PathConflict`] if a changed path is a directory of
    ///   another changed path
    pub fn freeze(self) -> Result<BonsaiChangeset, BonsaiError> {
        let Some(message) = self.message else {
            tracing::warn!("rejecting changeset without message");
            return Err(BonsaiError::MissingRequiredField("message"));
        };
        let file_changes: BTreeMap<TreePath, FileChangeOpt> =
            self.file_changes.into_iter().collect();
        if let Err(err) = path::check_pcf_sorted(file_changes.keys()) {
            tracing::warn!(error = %err, "rejecting changeset");
            return Err(err);
        }
        tracing::debug!(
            parents = self.parents.len(),
            file_changes = file_changes.len(),
            extra = self.extra.len(),
            "froze changeset"
        );
        Ok(BonsaiChangeset {
            parents: self.parents,
            author: self.author,
            author_date: self.author_date,
            committer: self.committer,
            committer_date: self.committer_date,
            message,
            extra: self.extra,
            file_changes,
        })
    }
}

/// Immutable, validated changeset
///
/// # Invariants
/// - `file_changes` is path-conflict-free
/// - No mutators: safe to share across threads once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BonsaiChangeset {
    pub(crate) parents: Vec<ChangesetId>,
    pub(crate) author: Option<String>,
    pub(crate) author_date: Option<DateTime>,
    pub(crate) committer: Option<String>,
    pub(crate) committer_date: Option<DateTime>,
    pub(crate) message: String,
    pub(crate) extra: HashMap<String, String>,
    pub(crate) file_changes: BTreeMap<TreePath, FileChangeOpt>,
}

impl BonsaiChangeset {
    /// Parents, in presented order
    #[inline]
    #[must_use]
    pub fn parents(&self) -> &[ChangesetId] {
        &self.parents
    }

    #[inline]
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    #[inline]
    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn author_date(&self) -> Option<&DateTime> {
        self.author_date.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn committer(&self) -> Option<&str> {
        self.committer.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn committer_date(&self) -> Option<&DateTime> {
        self.committer_date.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    #[must_use]
    pub fn extra(&self) -> &HashMap<String, String> {
        &self.extra
    }

    #[inline]
    #[must_use]
    pub fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// Changed paths in tree order
    #[inline]
    pub fn file_changes(&self) -> impl ExactSizeIterator<Item = (&TreePath, &FileChangeOpt)> {
        self.file_changes.iter()
    }

    #[inline]
    #[must_use]
    pub fn file_change(&self, path: &TreePath) -> Option<&FileChangeOpt> {
        self.file_changes.get(path)
    }

    /// Reopen as a builder, e.g. to derive a rewritten changeset
    #[must_use]
    pub fn into_mut(self) -> BonsaiChangesetMut {
        BonsaiChangesetMut {
            parents: self.parents,
            author: self.author,
            author_date: self.author_date,
            committer: self.committer,
            committer_date: self.committer_date,
            message: Some(self.message),
            extra: self.extra,
            file_changes: self.file_changes.into_iter().collect(),
        }
    }

    /// Canonical bytes: the input to hashing and the stored form
    #[must_use]
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        codec::encode_changeset(self)
    }

    /// Decode and validate canonical bytes
    ///
    /// # Errors
    /// Returns [`DecodeError`] if the bytes are malformed, not canonical, or
    /// describe an invalid changeset
    pub fn from_canonical_bytes(bytes: &[u8], config: &DecodeConfig) -> Result<Self, DecodeError> {
        codec::decode_changeset(bytes, config)
    }
}
