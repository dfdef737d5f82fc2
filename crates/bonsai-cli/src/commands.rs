//! Subcommand implementations
//!
//! Each command returns a serializable report; `main` prints it.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use bonsai_blobstore::{Blake3Engine, ChangesetStore, HashingEngine, MemBlobstore, StoreConfig};
use bonsai_types::{
    check_pcf, BonsaiChangeset, BonsaiChangesetMut, BonsaiError, ChangesetId, ContentId, DateTime,
    FileChange, FileType, IdDomain, TreePath,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct EncodeReport {
    pub(crate) id: ChangesetId,
    pub(crate) key: String,
    pub(crate) canonical: String,
}

/// Printable view of a decoded changeset
///
/// Paths render lossily so non-UTF-8 elements still print, and `extra` is
/// sorted so output is stable across runs.
#[derive(Debug, Serialize)]
pub(crate) struct DecodeReport {
    pub(crate) id: ChangesetId,
    pub(crate) parents: Vec<ChangesetId>,
    pub(crate) author: Option<String>,
    pub(crate) author_date: Option<DateTime>,
    pub(crate) committer: Option<String>,
    pub(crate) committer_date: Option<DateTime>,
    pub(crate) message: String,
    pub(crate) extra: BTreeMap<String, String>,
    pub(crate) file_changes: Vec<FileChangeEntry>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FileChangeEntry {
    pub(crate) path: String,
    /// `None` for a deletion
    pub(crate) change: Option<FileChangeView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FileChangeView {
    pub(crate) content_id: ContentId,
    pub(crate) file_type: FileType,
    pub(crate) size: u64,
    pub(crate) copy_from: Option<CopyFromView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CopyFromView {
    pub(crate) path: String,
    pub(crate) changeset: ChangesetId,
}

impl DecodeReport {
    fn new(id: ChangesetId, cs: &BonsaiChangeset) -> Self {
        Self {
            id,
            parents: cs.parents().to_vec(),
            author: cs.author().map(str::to_owned),
            author_date: cs.author_date().copied(),
            committer: cs.committer().map(str::to_owned),
            committer_date: cs.committer_date().copied(),
            message: cs.message().to_owned(),
            extra: cs.extra().clone().into_iter().collect(),
            file_changes: cs
                .file_changes()
                .map(|(path, change)| FileChangeEntry {
                    path: path.to_string(),
                    change: change.change().map(FileChangeView::from),
                })
                .collect(),
        }
    }
}

impl From<&FileChange> for FileChangeView {
    fn from(change: &FileChange) -> Self {
        Self {
            content_id: *change.content_id(),
            file_type: change.file_type(),
            size: change.size(),
            copy_from: change.copy_from().map(|copy| CopyFromView {
                path: copy.path.to_string(),
                changeset: copy.changeset,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HashReport {
    pub(crate) domain: IdDomain,
    pub(crate) id: String,
    pub(crate) key: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PcfReport {
    pub(crate) paths: usize,
    pub(crate) conflict: Option<String>,
}

/// Freeze a JSON changeset and push it through an in-memory store
pub(crate) async fn encode(json: &[u8], config: &StoreConfig) -> Result<EncodeReport> {
    let changeset: BonsaiChangesetMut =
        serde_json::from_slice(json).context("parsing changeset JSON")?;
    let changeset = changeset.freeze().context("validating changeset")?;

    let store = ChangesetStore::new(Arc::new(MemBlobstore::new()), config.clone());
    let id = store.put_changeset(&changeset).await?;
    let stored = store
        .get_changeset(&id)
        .await
        .context("reading back stored changeset")?;
    ensure!(stored.as_ref() == Some(&changeset), "stored changeset {id} did not read back");

    Ok(EncodeReport {
        id,
        key: id.blobstore_key(&config.key_prefix),
        canonical: hex::encode(changeset.to_canonical_bytes()),
    })
}

/// Decode hex canonical bytes
pub(crate) fn decode(hex_input: &str, config: &StoreConfig) -> Result<DecodeReport> {
    let bytes = hex::decode(hex_input.trim()).context("parsing hex input")?;
    let changeset = BonsaiChangeset::from_canonical_bytes(&bytes, &config.decode)
        .context("decoding canonical changeset")?;
    let id = Blake3Engine::new().changeset_id_of_bytes(&bytes);
    Ok(DecodeReport::new(id, &changeset))
}

pub(crate) fn hash(bytes: &[u8], domain: IdDomain, config: &StoreConfig) -> HashReport {
    let engine = Blake3Engine::new();
    let (id, key) = match domain {
        IdDomain::Content => {
            let id = engine.content_id(bytes);
            (id.to_string(), id.blobstore_key(&config.key_prefix))
        }
        IdDomain::Changeset => {
            let id = engine.changeset_id_of_bytes(bytes);
            (id.to_string(), id.blobstore_key(&config.key_prefix))
        }
    };
    HashReport { domain, id, key }
}

/// Check a set of changed paths for path conflicts
pub(crate) fn check_paths<S: AsRef<str>>(paths: &[S]) -> Result<PcfReport> {
    let parsed = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            TreePath::new(p).with_context(|| format!("parsing path {p:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let conflict = match check_pcf(&parsed) {
        Ok(()) => None,
        Err(err @ BonsaiError::PathConflict { .. }) => Some(err.to_string()),
        Err(err) => return Err(err.into()),
    };
    Ok(PcfReport {
        paths: parsed.len(),
        conflict,
    })
}
