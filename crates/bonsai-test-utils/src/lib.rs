//! Testing utilities for the bonsai workspace
//!
//! Shared fixtures and proptest strategies.

#![allow(missing_docs)]

use std::collections::HashMap;

use bonsai_types::{
    BonsaiChangeset, BonsaiChangesetMut, ChangesetId, ContentId, CopyInfo, DateTime, FileChange,
    FileChangeOpt, FileType, PathElement, TreePath, MAX_TZ_OFFSET_SECS,
};
use proptest::collection::{hash_map, vec};
use proptest::prelude::*;

pub fn path(s: &str) -> TreePath {
    TreePath::new(s).unwrap()
}

pub fn content_id(byte: u8) -> ContentId {
    ContentId::from_bytes(&[byte; 32]).unwrap()
}

pub fn changeset_id(byte: u8) -> ChangesetId {
    ChangesetId::from_bytes(&[byte; 32]).unwrap()
}

pub fn regular_file(byte: u8, size: u64) -> FileChange {
    FileChange::new(content_id(byte), FileType::Regular, size, None).unwrap()
}

/// A small changeset touching every field
pub fn sample_changeset() -> BonsaiChangeset {
    BonsaiChangesetMut::new()
        .with_parent(changeset_id(1))
        .with_parent(changeset_id(2))
        .with_author(
            "Jane Doe <jane@example.com>",
            Some(DateTime::new(1_600_000_000, 3600).unwrap()),
        )
        .with_committer("CI <ci@example.com>", Some(DateTime::new(1_600_000_100, 0).unwrap()))
        .with_message("Merge branch 'feature'")
        .with_extra("branch", "default")
        .with_extra("convert_revision", "0123abcd")
        .with_file_change(path("README.md"), regular_file(3, 120))
        .with_file_change(
            path("bin/run"),
            FileChange::new(
                content_id(4),
                FileType::Executable,
                64,
                Some(CopyInfo::new(path("scripts/run"), changeset_id(1))),
            )
            .unwrap(),
        )
        .with_file_change(path("scripts/run"), FileChangeOpt::deleted())
        .freeze()
        .unwrap()
}

pub fn arb_changeset_id() -> impl Strategy<Value = ChangesetId> {
    any::<[u8; 32]>().prop_map(|bytes| ChangesetId::from_bytes(&bytes).unwrap())
}

pub fn arb_content_id() -> impl Strategy<Value = ContentId> {
    any::<[u8; 32]>().prop_map(|bytes| ContentId::from_bytes(&bytes).unwrap())
}

/// Path elements, mostly from a small alphabet so that shared
/// directories, prefixes and `a/b` vs `a.b` orderings are common
pub fn arb_path_element() -> impl Strategy<Value = PathElement> {
    // Any byte except the separator and the reserved \0, \x01 and \n
    let byte = prop_oneof![2u8..=9, 11u8..=46, 48u8..=255];
    let raw = vec(byte, 1..8).prop_map(|bytes| PathElement::new(bytes).unwrap());
    let common = prop::sample::select(vec!["a", "b", "a.b", "a1"])
        .prop_map(|name| PathElement::new(name).unwrap());
    prop_oneof![9 => common, 1 => raw]
}

pub fn arb_path() -> impl Strategy<Value = TreePath> {
    vec(arb_path_element(), 1..4).prop_map(|elements| TreePath::from_elements(elements).unwrap())
}

pub fn arb_datetime() -> impl Strategy<Value = DateTime> {
    (any::<i64>(), -MAX_TZ_OFFSET_SECS..=MAX_TZ_OFFSET_SECS)
        .prop_map(|(ts, offset)| DateTime::new(ts, offset).unwrap())
}

pub fn arb_file_type() -> impl Strategy<Value = FileType> {
    prop_oneof![
        Just(FileType::Regular),
        Just(FileType::Executable),
        Just(FileType::Symlink),
    ]
}

pub fn arb_file_change_opt() -> impl Strategy<Value = FileChangeOpt> {
    let copy = proptest::option::of(
        (arb_path(), arb_changeset_id()).prop_map(|(path, cs)| CopyInfo::new(path, cs)),
    );
    let change = (arb_content_id(), arb_file_type(), 0..=FileChange::MAX_SIZE, copy).prop_map(
        |(id, file_type, size, copy)| FileChange::new(id, file_type, size, copy).unwrap(),
    );
    proptest::option::weighted(0.8, change).prop_map(FileChangeOpt::from)
}

/// Changed-path maps with conflicting entries removed
pub fn arb_file_changes() -> impl Strategy<Value = HashMap<TreePath, FileChangeOpt>> {
    hash_map(arb_path(), arb_file_change_opt(), 0..12).prop_map(|mut changes| {
        let mut paths: Vec<TreePath> = changes.keys().cloned().collect();
        paths.sort();
        let mut kept: Option<TreePath> = None;
        for path in paths {
            match &kept {
                Some(prefix) if prefix.is_ancestor_of(&path) => {
                    changes.remove(&path);
                }
                _ => kept = Some(path),
            }
        }
        changes
    })
}

/// Unfrozen changesets that always freeze successfully
pub fn arb_changeset_mut() -> impl Strategy<Value = BonsaiChangesetMut> {
    (
        vec(arb_changeset_id(), 0..3),
        proptest::option::of(".{0,12}"),
        proptest::option::of(arb_datetime()),
        proptest::option::of(".{0,12}"),
        proptest::option::of(arb_datetime()),
        ".{0,40}",
        hash_map(".{0,8}", ".{0,8}", 0..4),
        arb_file_changes(),
    )
        .prop_map(
            |(
                parents,
                author,
                author_date,
                committer,
                committer_date,
                message,
                extra,
                file_changes,
            )| BonsaiChangesetMut {
                parents,
                author,
                author_date,
                committer,
                committer_date,
                message: Some(message),
                extra,
                file_changes,
            },
        )
}

pub fn arb_changeset() -> impl Strategy<Value = BonsaiChangeset> {
    arb_changeset_mut().prop_map(|cs| cs.freeze().unwrap())
}
