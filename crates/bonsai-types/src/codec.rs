//! Canonical binary encoding
//!
//! Every logical value has exactly one byte representation, and a changeset's
//! identity is the hash of that representation. The format is a closed,
//! versioned contract:
//!
//! - A top-level value starts with [`FORMAT_VERSION`].
//! - Structs are `(tag, value)*` followed by [`STOP`]. Tags are written in
//!   strictly ascending order. Absent optional fields are left out, required
//!   fields are always written.
//! - Lengths and enum values are minimal LEB128 varints. Signed integers
//!   are fixed-width big-endian.
//! - Maps are a count followed by entries in strictly ascending key order.
//! - An identifier is its algorithm discriminant followed by its digest.
//!
//! New fields take new tags after the existing ones. Tags are never reused.
//!
//! Decoding rejects anything that would not re-encode to the same bytes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::changeset::{BonsaiChangeset, BonsaiChangesetMut};
use crate::datetime::DateTime;
use crate::error::BonsaiError;
use crate::file_change::{CopyInfo, FileChange, FileChangeOpt, FileType};
use crate::hash::{HashAlgorithm, IdHash};
use crate::path::{PathElement, TreePath};
use crate::typed_hash::{Domain, TypedId};

/// Leading byte of every top-level encoding
pub const FORMAT_VERSION: u8 = 1;

/// Terminates a struct's field list
pub const STOP: u8 = 0;

mod tags {
    pub(super) mod changeset {
        pub(crate) const PARENTS: u8 = 1;
        pub(crate) const AUTHOR: u8 = 2;
        pub(crate) const AUTHOR_DATE: u8 = 3;
        pub(crate) const COMMITTER: u8 = 4;
        pub(crate) const COMMITTER_DATE: u8 = 5;
        pub(crate) const MESSAGE: u8 = 6;
        pub(crate) const EXTRA: u8 = 7;
        pub(crate) const FILE_CHANGES: u8 = 8;
    }

    pub(super) mod datetime {
        pub(crate) const TIMESTAMP: u8 = 1;
        pub(crate) const TZ_OFFSET: u8 = 2;
    }

    pub(super) mod file_change {
        pub(crate) const CONTENT_ID: u8 = 1;
        pub(crate) const FILE_TYPE: u8 = 2;
        pub(crate) const SIZE: u8 = 3;
        pub(crate) const COPY_FROM: u8 = 4;
    }

    pub(super) mod copy_info {
        pub(crate) const PATH: u8 = 1;
        pub(crate) const CHANGESET: u8 = 2;
    }

    pub(super) mod file_change_opt {
        pub(crate) const CHANGE: u8 = 1;
    }
}

/// Limits applied when decoding untrusted bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Maximum entries in any list or map
    pub max_entries: usize,
    /// Maximum length of any byte string
    pub max_bytes_len: usize,
    /// Maximum number of elements in a path
    pub max_path_depth: usize,
}

impl DecodeConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_bytes_len(mut self, max: usize) -> Self {
        self.max_bytes_len = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_path_depth(mut self, max: usize) -> Self {
        self.max_path_depth = max;
        self
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_entries: 1 << 20,
            max_bytes_len: 64 << 20,
            max_path_depth: 1024,
        }
    }
}

/// Failure to decode canonical bytes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {offset}")]
    Truncated { offset: usize },

    #[error("{count} trailing bytes after value")]
    TrailingBytes { count: usize },

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown field tag {tag} in {ty}")]
    UnknownField { ty: &'static str, tag: u8 },

    #[error("field tag {tag} in {ty} is out of order")]
    FieldOutOfOrder { ty: &'static str, tag: u8 },

    #[error("unknown hash algorithm discriminant {0}")]
    UnknownHashAlgorithm(u64),

    #[error("unknown file type {0}")]
    UnknownFileType(u64),

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("non-canonical encoding: {0}")]
    NonCanonical(&'static str),

    #[error("{what} exceeds limit: {actual} > {limit}")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        actual: u64,
    },

    /// Bytes were well-formed but describe an invalid value
    #[error(transparent)]
    Invalid(#[from] BonsaiError),
}

/// A value with a canonical byte encoding
pub trait Canonical: Sized {
    /// Append the canonical bytes of `self`
    fn encode(&self, enc: &mut Encoder);

    /// Read one value, leaving the decoder just past it
    ///
    /// # Errors
    /// Returns [`DecodeError`] on malformed, non-canonical or invalid input
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError>;
}

/// Encode a top-level value, version byte included
#[must_use]
pub fn to_bytes<T: Canonical>(value: &T) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.u8(FORMAT_VERSION);
    value.encode(&mut enc);
    enc.into_bytes()
}

/// Decode a top-level value, requiring every input byte to be consumed
///
/// # Errors
/// Returns [`DecodeError`] on malformed, non-canonical or invalid input
pub fn from_bytes<T: Canonical>(bytes: &[u8], config: &DecodeConfig) -> Result<T, DecodeError> {
    let mut dec = Decoder::new(bytes, config);
    let version = dec.u8()?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let value = T::decode(&mut dec)?;
    dec.finish()?;
    Ok(value)
}

pub(crate) fn encode_changeset(cs: &BonsaiChangeset) -> Vec<u8> {
    let bytes = to_bytes(cs);
    tracing::debug!(
        bytes = bytes.len(),
        file_changes = cs.file_changes.len(),
        "encoded changeset"
    );
    bytes
}

pub(crate) fn decode_changeset(
    bytes: &[u8],
    config: &DecodeConfig,
) -> Result<BonsaiChangeset, DecodeError> {
    let cs: BonsaiChangeset = from_bytes(bytes, config).map_err(|err| {
        tracing::warn!(error = %err, bytes = bytes.len(), "failed to decode changeset");
        err
    })?;
    tracing::debug!(
        bytes = bytes.len(),
        file_changes = cs.file_changes.len(),
        "decoded changeset"
    );
    Ok(cs)
}

/// Append-only canonical writer
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[inline]
    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Minimal LEB128
    pub fn varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    #[inline]
    pub fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    #[inline]
    pub fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    #[inline]
    pub fn length(&mut self, len: usize) {
        self.varint(len as u64);
    }

    pub fn bytes(&mut self, bytes: &[u8]) {
        self.length(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub fn tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    #[inline]
    pub fn stop(&mut self) {
        self.buf.push(STOP);
    }

    /// Write an optional field; nothing at all when absent
    pub fn optional<T: Canonical>(&mut self, tag: u8, value: Option<&T>) {
        if let Some(value) = value {
            self.tag(tag);
            value.encode(self);
        }
    }
}

/// Cursor over canonical bytes
#[derive(Debug)]
pub struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    config: &'a DecodeConfig,
}

impl<'a> Decoder<'a> {
    #[inline]
    #[must_use]
    pub fn new(input: &'a [u8], config: &'a DecodeConfig) -> Self {
        Self {
            input,
            pos: 0,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &DecodeConfig {
        self.config
    }

    /// Fail unless all input was consumed
    ///
    /// # Errors
    /// Returns [`DecodeError::TrailingBytes`]
    pub fn finish(&self) -> Result<(), DecodeError> {
        let count = self.input.len() - self.pos;
        if count > 0 {
            return Err(DecodeError::TrailingBytes { count });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.input.len())
            .ok_or(DecodeError::Truncated {
                offset: self.input.len(),
            })?;
        let out = &self.input[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// # Errors
    /// Returns [`DecodeError::Truncated`] at end of input
    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// # Errors
    /// Rejects overlong and overflowing encodings
    pub fn varint(&mut self) -> Result<u64, DecodeError> {
        let mut value = 0u64;
        for i in 0..10 {
            let byte = self.u8()?;
            if i == 9 && byte > 1 {
                return Err(DecodeError::NonCanonical("varint overflows 64 bits"));
            }
            if i > 0 && byte == 0 {
                return Err(DecodeError::NonCanonical("overlong varint"));
            }
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(DecodeError::NonCanonical("varint overflows 64 bits"))
    }

    /// # Errors
    /// Returns [`DecodeError::Truncated`] at end of input
    pub fn i64(&mut self) -> Result<i64, DecodeError> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(arr))
    }

    /// # Errors
    /// Returns [`DecodeError::Truncated`] at end of input
    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.take(4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(i32::from_be_bytes(arr))
    }

    fn bounded(&mut self, what: &'static str, limit: usize) -> Result<usize, DecodeError> {
        let actual = self.varint()?;
        match usize::try_from(actual) {
            Ok(n) if n <= limit => Ok(n),
            _ => Err(DecodeError::LimitExceeded {
                what,
                limit,
                actual,
            }),
        }
    }

    /// Entry count of a list or map
    ///
    /// # Errors
    /// Returns [`DecodeError::LimitExceeded`] above `max_entries`
    pub fn count(&mut self) -> Result<usize, DecodeError> {
        self.bounded("entry count", self.config.max_entries)
    }

    /// # Errors
    /// Returns [`DecodeError::LimitExceeded`] above `max_bytes_len`
    pub fn bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.bounded("byte string length", self.config.max_bytes_len)?;
        self.take(len)
    }

    /// # Errors
    /// Returns [`DecodeError::InvalidUtf8`] if the bytes are not UTF-8
    pub fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Next field tag of struct `ty`, or `None` at [`STOP`]
    ///
    /// `last` carries the previous tag so ordering can be enforced.
    ///
    /// # Errors
    /// Returns [`DecodeError::FieldOutOfOrder`] unless tags strictly ascend
    pub fn next_field(
        &mut self,
        ty: &'static str,
        last: &mut u8,
    ) -> Result<Option<u8>, DecodeError> {
        let tag = self.u8()?;
        if tag == STOP {
            return Ok(None);
        }
        if tag <= *last {
            return Err(DecodeError::FieldOutOfOrder { ty, tag });
        }
        *last = tag;
        Ok(Some(tag))
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::Invalid(BonsaiError::MissingRequiredField(field)))
}

fn check_ascending<K: Ord>(prev: Option<&K>, key: &K) -> Result<(), DecodeError> {
    match prev {
        Some(prev) if prev >= key => {
            Err(DecodeError::NonCanonical("map keys not strictly ascending"))
        }
        _ => Ok(()),
    }
}

impl Canonical for IdHash {
    fn encode(&self, enc: &mut Encoder) {
        enc.varint(self.algorithm().discriminant());
        enc.bytes(self.as_bytes());
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let discriminant = dec.varint()?;
        let algorithm = HashAlgorithm::from_discriminant(discriminant)
            .ok_or(DecodeError::UnknownHashAlgorithm(discriminant))?;
        let bytes = dec.bytes()?;
        Ok(Self::from_parts(algorithm, bytes)?)
    }
}

/// The surrounding field fixes the domain; the bytes carry none.
impl<D: Domain> Canonical for TypedId<D> {
    fn encode(&self, enc: &mut Encoder) {
        self.hash().encode(enc);
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        IdHash::decode(dec).map(Self::from_hash)
    }
}

impl Canonical for String {
    fn encode(&self, enc: &mut Encoder) {
        enc.bytes(self.as_bytes());
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        dec.string("string")
    }
}

impl Canonical for TreePath {
    fn encode(&self, enc: &mut Encoder) {
        enc.length(self.num_components());
        for element in self {
            enc.bytes(element.as_bytes());
        }
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let depth = dec.count()?;
        let limit = dec.config().max_path_depth;
        if depth > limit {
            return Err(DecodeError::LimitExceeded {
                what: "path depth",
                limit,
                actual: depth as u64,
            });
        }
        let mut elements = Vec::with_capacity(depth);
        for _ in 0..depth {
            elements.push(PathElement::new(dec.bytes()?)?);
        }
        Ok(Self::from_elements(elements)?)
    }
}

impl Canonical for DateTime {
    fn encode(&self, enc: &mut Encoder) {
        use tags::datetime::*;
        enc.tag(TIMESTAMP);
        enc.i64(self.timestamp_secs());
        enc.tag(TZ_OFFSET);
        enc.i32(self.tz_offset_secs());
        enc.stop();
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        use tags::datetime::*;
        let (mut timestamp, mut offset) = (None, None);
        let mut last = STOP;
        while let Some(tag) = dec.next_field("DateTime", &mut last)? {
            match tag {
                TIMESTAMP => timestamp = Some(dec.i64()?),
                TZ_OFFSET => offset = Some(dec.i32()?),
                tag => return Err(DecodeError::UnknownField { ty: "DateTime", tag }),
            }
        }
        Ok(Self::new(
            required(timestamp, "timestamp_secs")?,
            required(offset, "tz_offset_secs")?,
        )?)
    }
}

impl Canonical for CopyInfo {
    fn encode(&self, enc: &mut Encoder) {
        use tags::copy_info::*;
        enc.tag(PATH);
        self.path.encode(enc);
        enc.tag(CHANGESET);
        self.changeset.encode(enc);
        enc.stop();
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        use tags::copy_info::*;
        let (mut path, mut changeset) = (None, None);
        let mut last = STOP;
        while let Some(tag) = dec.next_field("CopyInfo", &mut last)? {
            match tag {
                PATH => path = Some(TreePath::decode(dec)?),
                CHANGESET => changeset = Some(TypedId::decode(dec)?),
                tag => return Err(DecodeError::UnknownField { ty: "CopyInfo", tag }),
            }
        }
        Ok(Self::new(
            required(path, "copy_from.path")?,
            required(changeset, "copy_from.changeset")?,
        ))
    }
}

impl Canonical for FileChange {
    fn encode(&self, enc: &mut Encoder) {
        use tags::file_change::*;
        enc.tag(CONTENT_ID);
        self.content_id().encode(enc);
        enc.tag(FILE_TYPE);
        enc.varint(self.file_type().code());
        enc.tag(SIZE);
        // MAX_SIZE is i64::MAX, so this never wraps
        enc.i64(self.size() as i64);
        enc.optional(COPY_FROM, self.copy_from());
        enc.stop();
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        use tags::file_change::*;
        let (mut content_id, mut file_type, mut size, mut copy_from) = (None, None, None, None);
        let mut last = STOP;
        while let Some(tag) = dec.next_field("FileChange", &mut last)? {
            match tag {
                CONTENT_ID => content_id = Some(TypedId::decode(dec)?),
                FILE_TYPE => {
                    let code = dec.varint()?;
                    file_type =
                        Some(FileType::from_code(code).ok_or(DecodeError::UnknownFileType(code))?);
                }
                SIZE => {
                    let value = dec.i64()?;
                    let value = u64::try_from(value)
                        .map_err(|_| BonsaiError::out_of_range("size", value, 0, i64::MAX))?;
                    size = Some(value);
                }
                COPY_FROM => copy_from = Some(CopyInfo::decode(dec)?),
                tag => return Err(DecodeError::UnknownField { ty: "FileChange", tag }),
            }
        }
        Ok(Self::new(
            required(content_id, "content_id")?,
            required(file_type, "file_type")?,
            required(size, "size")?,
            copy_from,
        )?)
    }
}

impl Canonical for FileChangeOpt {
    fn encode(&self, enc: &mut Encoder) {
        enc.optional(tags::file_change_opt::CHANGE, self.change());
        enc.stop();
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let mut change = None;
        let mut last = STOP;
        while let Some(tag) = dec.next_field("FileChangeOpt", &mut last)? {
            match tag {
                tags::file_change_opt::CHANGE => change = Some(FileChange::decode(dec)?),
                tag => return Err(DecodeError::UnknownField { ty: "FileChangeOpt", tag }),
            }
        }
        Ok(change.into())
    }
}

impl Canonical for BonsaiChangeset {
    fn encode(&self, enc: &mut Encoder) {
        use tags::changeset::*;

        enc.tag(PARENTS);
        enc.length(self.parents.len());
        for parent in &self.parents {
            parent.encode(enc);
        }

        enc.optional(AUTHOR, self.author.as_ref());
        enc.optional(AUTHOR_DATE, self.author_date.as_ref());
        enc.optional(COMMITTER, self.committer.as_ref());
        enc.optional(COMMITTER_DATE, self.committer_date.as_ref());

        enc.tag(MESSAGE);
        self.message.encode(enc);

        // HashMap iteration order is arbitrary; the format is not.
        let mut extra: Vec<_> = self.extra.iter().collect();
        extra.sort_unstable_by(|a, b| a.0.cmp(b.0));
        enc.tag(EXTRA);
        enc.length(extra.len());
        for (key, value) in extra {
            key.encode(enc);
            value.encode(enc);
        }

        enc.tag(FILE_CHANGES);
        enc.length(self.file_changes.len());
        for (path, change) in &self.file_changes {
            path.encode(enc);
            change.encode(enc);
        }

        enc.stop();
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        use tags::changeset::*;

        let mut cs = BonsaiChangesetMut::new();
        let (mut saw_parents, mut saw_extra, mut saw_file_changes) = (false, false, false);
        let mut last = STOP;
        while let Some(tag) = dec.next_field("BonsaiChangeset", &mut last)? {
            match tag {
                PARENTS => {
                    let count = dec.count()?;
                    for _ in 0..count {
                        cs.parents.push(TypedId::decode(dec)?);
                    }
                    saw_parents = true;
                }
                AUTHOR => cs.author = Some(dec.string("author")?),
                AUTHOR_DATE => cs.author_date = Some(DateTime::decode(dec)?),
                COMMITTER => cs.committer = Some(dec.string("committer")?),
                COMMITTER_DATE => cs.committer_date = Some(DateTime::decode(dec)?),
                MESSAGE => cs.message = Some(dec.string("message")?),
                EXTRA => {
                    cs.extra = decode_map(dec, |dec| dec.string("extra key"), |dec| {
                        dec.string("extra value")
                    })?;
                    saw_extra = true;
                }
                FILE_CHANGES => {
                    cs.file_changes = decode_map(dec, TreePath::decode, FileChangeOpt::decode)?;
                    saw_file_changes = true;
                }
                tag => return Err(DecodeError::UnknownField { ty: "BonsaiChangeset", tag }),
            }
        }
        if !saw_parents {
            return Err(BonsaiError::MissingRequiredField("parents").into());
        }
        if !saw_extra {
            return Err(BonsaiError::MissingRequiredField("extra").into());
        }
        if !saw_file_changes {
            return Err(BonsaiError::MissingRequiredField("file_changes").into());
        }
        Ok(cs.freeze()?)
    }
}

fn decode_map<'a, K, V>(
    dec: &mut Decoder<'a>,
    key: impl Fn(&mut Decoder<'a>) -> Result<K, DecodeError>,
    value: impl Fn(&mut Decoder<'a>) -> Result<V, DecodeError>,
) -> Result<HashMap<K, V>, DecodeError>
where
    K: Ord + Clone + std::hash::Hash,
{
    let count = dec.count()?;
    let mut map = HashMap::with_capacity(count.min(1024));
    let mut prev: Option<K> = None;
    for _ in 0..count {
        let k = key(dec)?;
        check_ascending(prev.as_ref(), &k)?;
        let v = value(dec)?;
        prev = Some(k.clone());
        map.insert(k, v);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed_hash::{ChangesetId, ContentId};

    fn config() -> DecodeConfig {
        DecodeConfig::default()
    }

    fn p(s: &str) -> TreePath {
        TreePath::new(s).unwrap()
    }

    fn cs_id(byte: u8) -> ChangesetId {
        ChangesetId::from_bytes(&[byte; 32]).unwrap()
    }

    fn minimal() -> BonsaiChangeset {
        BonsaiChangesetMut::new().with_message("m").freeze().unwrap()
    }

    fn change(byte: u8) -> FileChange {
        FileChange::new(ContentId::from_bytes(&[byte; 32]).unwrap(), FileType::Regular, 12, None)
            .unwrap()
    }

    #[test]
    fn varint_roundtrip_and_minimality() {
        for value in [0u64, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            let mut enc = Encoder::new();
            enc.varint(value);
            let bytes = enc.into_bytes();
            let cfg = config();
            let mut dec = Decoder::new(&bytes, &cfg);
            assert_eq!(dec.varint().unwrap(), value);
            dec.finish().unwrap();
        }

        let cfg = config();
        let mut dec = Decoder::new(&[0x80, 0x00], &cfg);
        assert_eq!(dec.varint(), Err(DecodeError::NonCanonical("overlong varint")));

        let overflow = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        let mut dec = Decoder::new(&overflow, &cfg);
        assert!(matches!(dec.varint(), Err(DecodeError::NonCanonical(_))));
    }

    #[test]
    fn minimal_changeset_layout() {
        let cs = BonsaiChangesetMut::new().with_message("hi").freeze().unwrap();
        let bytes = cs.to_canonical_bytes();
        assert_eq!(
            bytes,
            vec![
                FORMAT_VERSION,
                1, 0, // parents: empty list
                6, 2, b'h', b'i', // message
                7, 0, // extra: empty map
                8, 0, // file_changes: empty map
                STOP,
            ]
        );
    }

    #[test]
    fn field_order_follows_tag_numbering() {
        let date = DateTime::new(1, 60).unwrap();
        let cs = BonsaiChangesetMut::new()
            .with_parent(cs_id(1))
            .with_author("a", Some(date))
            .with_committer("c", Some(date))
            .with_message("m")
            .with_extra("k", "v")
            .with_file_change(p("f"), change(2))
            .freeze()
            .unwrap();
        let bytes = cs.to_canonical_bytes();

        let cfg = config();
        let mut dec = Decoder::new(&bytes[1..], &cfg);
        let mut seen = Vec::new();
        let mut last = STOP;
        while let Some(tag) = dec.next_field("BonsaiChangeset", &mut last).unwrap() {
            seen.push(tag);
            match tag {
                1 => {
                    let n = dec.count().unwrap();
                    for _ in 0..n {
                        ChangesetId::decode(&mut dec).unwrap();
                    }
                }
                2 | 4 | 6 => {
                    dec.bytes().unwrap();
                }
                3 | 5 => {
                    DateTime::decode(&mut dec).unwrap();
                }
                7 => {
                    let n = dec.count().unwrap();
                    for _ in 0..2 * n {
                        dec.bytes().unwrap();
                    }
                }
                8 => {
                    let n = dec.count().unwrap();
                    for _ in 0..n {
                        TreePath::decode(&mut dec).unwrap();
                        FileChangeOpt::decode(&mut dec).unwrap();
                    }
                }
                _ => unreachable!(),
            }
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        dec.finish().unwrap();
    }

    #[test]
    fn optional_fields_are_omitted() {
        let without = BonsaiChangesetMut::new().with_message("m").freeze().unwrap();
        let with = BonsaiChangesetMut::new()
            .with_author("someone", None)
            .with_message("m")
            .freeze()
            .unwrap();
        let a = without.to_canonical_bytes();
        let b = with.to_canonical_bytes();
        assert_eq!(b.len(), a.len() + 1 + 1 + "someone".len());
    }

    #[test]
    fn roundtrip_full_changeset() {
        let copy = CopyInfo::new(p("old/path"), cs_id(7));
        let cs = BonsaiChangesetMut::new()
            .with_parent(cs_id(1))
            .with_parent(cs_id(2))
            .with_author("author", Some(DateTime::new(1_000, -3600).unwrap()))
            .with_message("message")
            .with_extra("convert_revision", "abc")
            .with_extra("branch", "default")
            .with_file_change(
                p("new/path"),
                FileChange::new(
                    ContentId::from_bytes(&[3; 32]).unwrap(),
                    FileType::Executable,
                    99,
                    Some(copy),
                )
                .unwrap(),
            )
            .with_file_change(p("gone"), FileChangeOpt::deleted())
            .freeze()
            .unwrap();
        let bytes = cs.to_canonical_bytes();
        let decoded = BonsaiChangeset::from_canonical_bytes(&bytes, &config()).unwrap();
        assert_eq!(decoded, cs);
        assert_eq!(decoded.to_canonical_bytes(), bytes);
    }

    #[test]
    fn unsupported_version() {
        let mut bytes = minimal().to_canonical_bytes();
        bytes[0] = 2;
        assert_eq!(
            BonsaiChangeset::from_canonical_bytes(&bytes, &config()),
            Err(DecodeError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn truncated_and_trailing() {
        let bytes = minimal().to_canonical_bytes();
        assert!(matches!(
            BonsaiChangeset::from_canonical_bytes(&bytes[..bytes.len() - 1], &config()),
            Err(DecodeError::Truncated { .. })
        ));
        let mut extended = bytes.clone();
        extended.push(0);
        assert_eq!(
            BonsaiChangeset::from_canonical_bytes(&extended, &config()),
            Err(DecodeError::TrailingBytes { count: 1 })
        );
    }

    #[test]
    fn missing_message_is_missing_required_field() {
        let bytes = vec![FORMAT_VERSION, 1, 0, 7, 0, 8, 0, STOP];
        assert_eq!(
            BonsaiChangeset::from_canonical_bytes(&bytes, &config()),
            Err(DecodeError::Invalid(BonsaiError::MissingRequiredField("message")))
        );
    }

    #[test]
    fn out_of_order_fields_are_rejected() {
        let bytes = vec![FORMAT_VERSION, 6, 1, b'm', 1, 0, 7, 0, 8, 0, STOP];
        assert_eq!(
            BonsaiChangeset::from_canonical_bytes(&bytes, &config()),
            Err(DecodeError::FieldOutOfOrder { ty: "BonsaiChangeset", tag: 1 })
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let bytes = vec![FORMAT_VERSION, 1, 0, 6, 1, b'm', 7, 0, 8, 0, 9, STOP];
        assert_eq!(
            BonsaiChangeset::from_canonical_bytes(&bytes, &config()),
            Err(DecodeError::UnknownField { ty: "BonsaiChangeset", tag: 9 })
        );
    }

    #[test]
    fn unsorted_extra_is_rejected() {
        let bytes = vec![
            FORMAT_VERSION,
            1, 0,
            6, 1, b'm',
            7, 2, 1, b'b', 0, 1, b'a', 0,
            8, 0,
            STOP,
        ];
        assert_eq!(
            BonsaiChangeset::from_canonical_bytes(&bytes, &config()),
            Err(DecodeError::NonCanonical("map keys not strictly ascending"))
        );
    }

    #[test]
    fn conflicting_paths_are_rejected_on_decode() {
        // foo (deleted) then foo/bar (deleted), ascending but not pcf
        let bytes = vec![
            FORMAT_VERSION,
            1, 0,
            6, 1, b'm',
            7, 0,
            8, 2,
            1, 3, b'f', b'o', b'o', STOP,
            2, 3, b'f', b'o', b'o', 3, b'b', b'a', b'r', STOP,
            STOP,
        ];
        assert!(matches!(
            BonsaiChangeset::from_canonical_bytes(&bytes, &config()),
            Err(DecodeError::Invalid(BonsaiError::PathConflict { .. }))
        ));
    }

    #[test]
    fn negative_size_is_out_of_range() {
        let mut enc = Encoder::new();
        enc.tag(tags::file_change::CONTENT_ID);
        ContentId::from_bytes(&[1; 32]).unwrap().encode(&mut enc);
        enc.tag(tags::file_change::FILE_TYPE);
        enc.varint(0);
        enc.tag(tags::file_change::SIZE);
        enc.i64(-1);
        enc.stop();
        let bytes = enc.into_bytes();
        let cfg = config();
        let mut dec = Decoder::new(&bytes, &cfg);
        assert!(matches!(
            FileChange::decode(&mut dec),
            Err(DecodeError::Invalid(BonsaiError::OutOfRange { field: "size", value: -1, .. }))
        ));
    }

    #[test]
    fn unknown_file_type_and_algorithm() {
        let cfg = config();
        let mut enc = Encoder::new();
        enc.varint(2);
        enc.bytes(&[0; 32]);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes, &cfg);
        assert_eq!(IdHash::decode(&mut dec), Err(DecodeError::UnknownHashAlgorithm(2)));

        let mut enc = Encoder::new();
        enc.varint(1);
        enc.bytes(&[0; 31]);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes, &cfg);
        assert!(matches!(
            IdHash::decode(&mut dec),
            Err(DecodeError::Invalid(BonsaiError::InvalidLength { actual: 31, .. }))
        ));

        let mut enc = Encoder::new();
        enc.tag(tags::file_change::CONTENT_ID);
        ContentId::from_bytes(&[1; 32]).unwrap().encode(&mut enc);
        enc.tag(tags::file_change::FILE_TYPE);
        enc.varint(5);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes, &cfg);
        assert_eq!(FileChange::decode(&mut dec), Err(DecodeError::UnknownFileType(5)));
    }

    #[test]
    fn limits_are_enforced() {
        let cs = BonsaiChangesetMut::new()
            .with_message("a long enough message")
            .freeze()
            .unwrap();
        let bytes = cs.to_canonical_bytes();
        let tight = DecodeConfig::new().with_max_bytes_len(4);
        assert!(matches!(
            BonsaiChangeset::from_canonical_bytes(&bytes, &tight),
            Err(DecodeError::LimitExceeded { what: "byte string length", .. })
        ));

        let deep = p("a/b/c/d");
        let cfg = DecodeConfig::new().with_max_path_depth(3);
        let encoded = to_bytes(&deep);
        assert!(matches!(
            from_bytes::<TreePath>(&encoded, &cfg),
            Err(DecodeError::LimitExceeded { what: "path depth", .. })
        ));
        assert_eq!(from_bytes::<TreePath>(&encoded, &config()).unwrap(), deep);
    }

    #[test]
    fn bad_path_element_is_malformed() {
        let bytes = vec![FORMAT_VERSION, 1, 3, b'a', b'/', b'b'];
        assert!(matches!(
            from_bytes::<TreePath>(&bytes, &config()),
            Err(DecodeError::Invalid(BonsaiError::MalformedPath { .. }))
        ));
        let empty = vec![FORMAT_VERSION, 0];
        assert!(matches!(
            from_bytes::<TreePath>(&empty, &config()),
            Err(DecodeError::Invalid(BonsaiError::MalformedPath { .. }))
        ));
    }
}
