//! Repository paths
//!
//! Provides [`PathElement`] and [`TreePath`] for addressing entries in a
//! repository tree, plus the path-conflict-free checks run over the changed
//! paths of a changeset.
//!
//! Paths are byte strings, not necessarily UTF-8. Ordering compares element
//! sequences, never the joined bytes: `a/b` sorts before `a.b` even though
//! `.` is below `/` in ASCII. This is the order of a depth-first walk over a
//! sorted tree.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BonsaiError;

/// Separator between path elements
pub const SEPARATOR: u8 = b'/';

/// One non-empty segment of a path
///
/// May not contain `/`, `\0`, `\x01` or `\n`. The last three are reserved
/// by the ordered-parent source system's manifest and metadata formats.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathElement(Vec<u8>);

impl PathElement {
    /// # Errors
    /// Returns [`BonsaiError::MalformedPath`] if the element is empty or
    /// contains a reserved byte
    pub fn new(element: impl Into<Vec<u8>>) -> Result<Self, BonsaiError> {
        let element = element.into();
        Self::verify(&element)?;
        Ok(Self(element))
    }

    fn verify(p: &[u8]) -> Result<(), BonsaiError> {
        if p.is_empty() {
            return Err(BonsaiError::malformed_path(p, "path elements cannot be empty"));
        }
        if p.contains(&SEPARATOR) {
            return Err(BonsaiError::malformed_path(p, "path elements cannot contain '/'"));
        }
        verify_reserved(p)
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: elements are non-empty by construction
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for PathElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PathElement(\"{}\")", String::from_utf8_lossy(&self.0))
    }
}

impl Display for PathElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Non-empty path within a repository tree
///
/// # Ordering
/// Element-by-element; the first differing element decides by byte
/// comparison and a strict prefix sorts first. A sorted stream of
/// path-keyed changes can therefore be applied to a tree in one pass.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreePath {
    elements: Vec<PathElement>,
}

impl TreePath {
    /// Parse a `/`-separated byte string
    ///
    /// Empty runs are skipped, so `a//b/` is `[a, b]`.
    ///
    /// # Errors
    /// Returns [`BonsaiError::MalformedPath`] if the path is logically empty
    /// or contains a reserved byte
    pub fn new(p: impl AsRef<[u8]>) -> Result<Self, BonsaiError> {
        let p = p.as_ref();
        verify_reserved(p)?;
        let elements: Vec<_> = p
            .split(|c| *c == SEPARATOR)
            .filter(|e| !e.is_empty())
            .map(|e| PathElement(e.to_vec()))
            .collect();
        if elements.is_empty() {
            return Err(BonsaiError::malformed_path(p, "path cannot be empty"));
        }
        Ok(Self { elements })
    }

    /// Build from already-validated elements
    ///
    /// # Errors
    /// Returns [`BonsaiError::MalformedPath`] if `elements` is empty
    pub fn from_elements(elements: Vec<PathElement>) -> Result<Self, BonsaiError> {
        if elements.is_empty() {
            return Err(BonsaiError::malformed_path(b"", "path cannot be empty"));
        }
        Ok(Self { elements })
    }

    #[inline]
    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Number of elements
    #[inline]
    #[must_use]
    pub fn num_components(&self) -> usize {
        self.elements.len()
    }

    /// Number of leading elements shared with `other`
    #[must_use]
    pub fn common_components(&self, other: &Self) -> usize {
        self.elements
            .iter()
            .zip(&other.elements)
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Whether this path is an element prefix of `other`
    ///
    /// `foo` is a prefix of `foo` and `foo/bar`, but not of `foo1`.
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.elements.len() <= other.elements.len()
            && self.elements[..] == other.elements[..self.elements.len()]
    }

    /// Whether this path names a directory containing `other`
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.elements.len() < other.elements.len() && self.is_prefix_of(other)
    }

    /// Final element
    #[inline]
    #[must_use]
    pub fn basename(&self) -> &PathElement {
        // non-empty by construction
        &self.elements[self.elements.len() - 1]
    }

    /// Split into parent directory (`None` at top level) and file name
    #[must_use]
    pub fn split_dirname(&self) -> (Option<Self>, &PathElement) {
        let last = self.elements.len() - 1;
        let dir = (last > 0).then(|| Self {
            elements: self.elements[..last].to_vec(),
        });
        (dir, &self.elements[last])
    }

    /// Parent directory, `None` for a top-level entry
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.split_dirname().0
    }

    /// Path made of the first `components` elements
    ///
    /// # Errors
    /// Returns [`BonsaiError::OutOfRange`] when asking for more elements than
    /// the path has
    pub fn take_prefix_components(&self, components: usize) -> Result<Option<Self>, BonsaiError> {
        if components > self.elements.len() {
            return Err(BonsaiError::out_of_range(
                "path components",
                components as u64,
                0u64,
                self.elements.len() as u64,
            ));
        }
        Ok((components > 0).then(|| Self {
            elements: self.elements[..components].to_vec(),
        }))
    }

    /// Append elements, returning a new path
    #[must_use]
    pub fn join<'a>(&self, other: impl IntoIterator<Item = &'a PathElement>) -> Self {
        let mut elements = self.elements.clone();
        elements.extend(other.into_iter().cloned());
        Self { elements }
    }

    #[must_use]
    pub fn join_element(&self, element: &PathElement) -> Self {
        self.join(std::iter::once(element))
    }

    /// Joined `/`-separated bytes
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let parts: Vec<&[u8]> = self.elements.iter().map(PathElement::as_bytes).collect();
        parts.join(&SEPARATOR)
    }

    /// Byte length of the joined path, separators included
    #[must_use]
    pub fn len(&self) -> usize {
        let elements: usize = self.elements.iter().map(PathElement::len).sum();
        elements + self.elements.len() - 1
    }

    /// Always false: paths are non-empty by construction
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.elements.iter()
    }
}

fn verify_reserved(p: &[u8]) -> Result<(), BonsaiError> {
    if p.contains(&0) {
        return Err(BonsaiError::malformed_path(p, "paths cannot contain '\\0'"));
    }
    if p.contains(&1) {
        return Err(BonsaiError::malformed_path(p, "paths cannot contain '\\1'"));
    }
    if p.contains(&b'\n') {
        return Err(BonsaiError::malformed_path(p, "paths cannot contain '\\n'"));
    }
    Ok(())
}

impl From<PathElement> for TreePath {
    fn from(element: PathElement) -> Self {
        Self {
            elements: vec![element],
        }
    }
}

impl<'a> IntoIterator for &'a TreePath {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl IntoIterator for TreePath {
    type Item = PathElement;
    type IntoIter = std::vec::IntoIter<PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl Display for TreePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_vec()))
    }
}

impl Debug for TreePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "TreePath(\"{self}\")")
    }
}

impl FromStr for TreePath {
    type Err = BonsaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&[u8]> for TreePath {
    type Error = BonsaiError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for TreePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let bytes = self.to_vec();
        if serializer.is_human_readable() {
            let s = std::str::from_utf8(&bytes).map_err(<S::Error as serde::ser::Error>::custom)?;
            serializer.serialize_str(s)
        } else {
            serializer.serialize_bytes(&bytes)
        }
    }
}

impl<'de> Deserialize<'de> for TreePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct TreePathVisitor;

        impl serde::de::Visitor<'_> for TreePathVisitor {
            type Value = TreePath;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a '/'-separated repository path")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                TreePath::new(value).map_err(E::custom)
            }

            fn visit_bytes<E>(self, value: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                TreePath::new(value).map_err(E::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(TreePathVisitor)
        } else {
            deserializer.deserialize_bytes(TreePathVisitor)
        }
    }
}

/// Path within a repository, with its kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryPath {
    Root,
    Directory(TreePath),
    File(TreePath),
}

impl EntryPath {
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    /// Directory other than the root
    #[inline]
    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Root or any other directory
    #[inline]
    #[must_use]
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Root | Self::Directory(_))
    }

    #[inline]
    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    #[must_use]
    pub fn path(&self) -> Option<&TreePath> {
        match self {
            Self::Root => None,
            Self::Directory(path) | Self::File(path) => Some(path),
        }
    }

    /// Byte length; the root has length 0
    #[must_use]
    pub fn len(&self) -> usize {
        self.path().map_or(0, TreePath::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }
}

impl Display for EntryPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("(root path)"),
            Self::Directory(path) => write!(f, "directory '{path}'"),
            Self::File(path) => write!(f, "file '{path}'"),
        }
    }
}

/// Check that a set of changed paths is path-conflict-free
///
/// Sorts `paths` and runs [`check_pcf_sorted`].
///
/// # Errors
/// Returns [`BonsaiError::PathConflict`] naming the first conflicting pair
pub fn check_pcf<'a>(paths: impl IntoIterator<Item = &'a TreePath>) -> Result<(), BonsaiError> {
    let mut sorted: Vec<&TreePath> = paths.into_iter().collect();
    sorted.sort_unstable();
    check_pcf_sorted(sorted)
}

/// Check that sorted changed paths are path-conflict-free
///
/// No path may be a directory of another. In sorted order `foo` is
/// immediately followed by everything under `foo/` and only then by `foo1`,
/// so an open-prefix stack finds every conflict in one pass.
///
/// # Errors
/// Returns [`BonsaiError::PathConflict`] naming the first conflicting pair
pub fn check_pcf_sorted<'a>(
    sorted_paths: impl IntoIterator<Item = &'a TreePath>,
) -> Result<(), BonsaiError> {
    let mut open: Vec<&TreePath> = Vec::new();
    for path in sorted_paths {
        while open.last().is_some_and(|top| !top.is_prefix_of(path)) {
            open.pop();
        }
        if let Some(top) = open.last() {
            if top.is_ancestor_of(path) {
                tracing::trace!(prefix = %top, path = %path, "pcf violation");
                return Err(BonsaiError::PathConflict {
                    prefix: (*top).clone(),
                    path: path.clone(),
                });
            }
        }
        open.push(path);
    }
    Ok(())
}

/// Check sorted `(path, is_changed)` entries for conflicts
///
/// Unchanged entries describe the surrounding tree. A changed path may not
/// be a directory of any later entry. An unchanged path may be a directory
/// of a changed one.
///
/// # Errors
/// Returns [`BonsaiError::PathConflict`] naming the first conflicting pair
pub fn check_pcf_marked<'a>(
    sorted_paths: impl IntoIterator<Item = (&'a TreePath, bool)>,
) -> Result<(), BonsaiError> {
    let mut last_changed: Option<&TreePath> = None;
    for (path, is_changed) in sorted_paths {
        if let Some(prefix) = last_changed {
            if prefix.is_prefix_of(path) {
                tracing::trace!(prefix = %prefix, path = %path, "pcf violation");
                return Err(BonsaiError::PathConflict {
                    prefix: prefix.clone(),
                    path: path.clone(),
                });
            }
        }
        if is_changed {
            last_changed = Some(path);
        }
    }
    Ok(())
}
