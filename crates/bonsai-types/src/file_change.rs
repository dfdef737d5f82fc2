//! Per-path change records

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::BonsaiError;
use crate::path::TreePath;
use crate::typed_hash::{ChangesetId, ContentId};

/// Kind of file a path holds
///
/// Wire values are fixed: Regular=0, Executable=1, Symlink=2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Regular,
    Executable,
    Symlink,
}

impl FileType {
    #[inline]
    #[must_use]
    pub const fn code(self) -> u64 {
        match self {
            Self::Regular => 0,
            Self::Executable => 1,
            Self::Symlink => 2,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Regular),
            1 => Some(Self::Executable),
            2 => Some(Self::Symlink),
            _ => None,
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Regular => "regular",
            Self::Executable => "executable",
            Self::Symlink => "symlink",
        })
    }
}

/// Where a file was copied or moved from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CopyInfo {
    pub path: TreePath,
    pub changeset: ChangesetId,
}

impl CopyInfo {
    #[inline]
    #[must_use]
    pub fn new(path: TreePath, changeset: ChangesetId) -> Self {
        Self { path, changeset }
    }
}

/// Addition or modification of a file
///
/// # Invariants
/// - `size` fits a signed 64-bit slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileChange {
    content_id: ContentId,
    file_type: FileType,
    size: u64,
    copy_from: Option<CopyInfo>,
}

impl FileChange {
    /// Largest representable file size
    pub const MAX_SIZE: u64 = i64::MAX as u64;

    /// # Errors
    /// Returns [`BonsaiError::OutOfRange`] if `size` exceeds [`Self::MAX_SIZE`]
    pub fn new(
        content_id: ContentId,
        file_type: FileType,
        size: u64,
        copy_from: Option<CopyInfo>,
    ) -> Result<Self, BonsaiError> {
        if size > Self::MAX_SIZE {
            return Err(BonsaiError::out_of_range("size", size, 0u64, Self::MAX_SIZE));
        }
        Ok(Self {
            content_id,
            file_type,
            size,
            copy_from,
        })
    }

    #[inline]
    #[must_use]
    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    #[inline]
    #[must_use]
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn copy_from(&self) -> Option<&CopyInfo> {
        self.copy_from.as_ref()
    }
}

#[derive(Deserialize)]
struct RawFileChange {
    content_id: ContentId,
    file_type: FileType,
    size: u64,
    #[serde(default)]
    copy_from: Option<CopyInfo>,
}

impl<'de> Deserialize<'de> for FileChange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawFileChange::deserialize(deserializer)?;
        Self::new(raw.content_id, raw.file_type, raw.size, raw.copy_from)
            .map_err(serde::de::Error::custom)
    }
}

/// Change recorded for one path: a new file version, or a deletion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileChangeOpt(Option<FileChange>);

impl FileChangeOpt {
    #[inline]
    #[must_use]
    pub fn changed(change: FileChange) -> Self {
        Self(Some(change))
    }

    #[inline]
    #[must_use]
    pub fn deleted() -> Self {
        Self(None)
    }

    /// The new file version, `None` for a deletion
    #[inline]
    #[must_use]
    pub fn change(&self) -> Option<&FileChange> {
        self.0.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.0.is_none()
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Option<FileChange> {
        self.0
    }
}

impl From<FileChange> for FileChangeOpt {
    fn from(change: FileChange) -> Self {
        Self::changed(change)
    }
}

impl From<Option<FileChange>> for FileChangeOpt {
    fn from(change: Option<FileChange>) -> Self {
        Self(change)
    }
}
