//! Raw hash values and the hash-algorithm union
//!
//! Provides [`Blake3`], the 32-byte digest backing every typed identifier,
//! [`IdHash`], the closed union over supported algorithms, and [`Sha1`], a
//! legacy 20-byte value kept for interoperability with the ordered-parent
//! source system.

use std::fmt::{self, Display, Formatter};
use std::marker::PhantomData;
use std::str::FromStr;

use crate::error::BonsaiError;

/// Length of a [`Blake3`] digest in bytes
pub const BLAKE3_LEN: usize = 32;

/// Length of a [`Sha1`] digest in bytes
pub const SHA1_LEN: usize = 20;

/// A 32-byte Blake3 digest
///
/// Stored as one contiguous block so it can be borrowed as a key without
/// copying. Ordering is byte-wise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Blake3([u8; BLAKE3_LEN]);

impl Blake3 {
    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; BLAKE3_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice
    ///
    /// # Errors
    /// Returns [`BonsaiError::InvalidLength`] unless the slice is exactly 32 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BonsaiError> {
        fixed_from_slice("blake3", bytes).map(Self)
    }

    /// Borrow the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BLAKE3_LEN] {
        &self.0
    }

    /// Convert to byte array (consumes self)
    #[inline]
    #[must_use]
    pub const fn into_bytes(self) -> [u8; BLAKE3_LEN] {
        self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Blake3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Blake3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({self})")
    }
}

impl FromStr for Blake3 {
    type Err = BonsaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for Blake3 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 20-byte SHA-1 digest
///
/// Not part of the [`IdHash`] union. Only used where the ordered-parent
/// source system's own node hashes must be carried around.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sha1([u8; SHA1_LEN]);

impl Sha1 {
    /// The all-zero hash, used by the source system to mean "no node"
    pub const NULL: Self = Self([0; SHA1_LEN]);

    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; SHA1_LEN]) -> Self {
        Self(bytes)
    }

    /// # Errors
    /// Returns [`BonsaiError::InvalidLength`] unless the slice is exactly 20 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BonsaiError> {
        fixed_from_slice("sha1", bytes).map(Self)
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SHA1_LEN] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl Display for Sha1 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Sha1 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Sha1({self})")
    }
}

impl FromStr for Sha1 {
    type Err = BonsaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

/// Hash algorithms an identifier can be built from
///
/// The discriminant is part of the canonical encoding. Values are fixed and
/// new algorithms may only be added with new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Blake3,
}

impl HashAlgorithm {
    /// Wire discriminant
    #[inline]
    #[must_use]
    pub const fn discriminant(self) -> u64 {
        match self {
            Self::Blake3 => 1,
        }
    }

    /// Look up an algorithm by wire discriminant
    #[inline]
    #[must_use]
    pub const fn from_discriminant(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Blake3),
            _ => None,
        }
    }

    /// Digest length produced by this algorithm
    #[inline]
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Blake3 => BLAKE3_LEN,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed union over supported hash algorithms
///
/// Every place that extracts bytes matches exhaustively, so adding an
/// algorithm is a compile error everywhere it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdHash {
    Blake3(Blake3),
}

impl IdHash {
    /// Build a hash of the given algorithm from raw bytes
    ///
    /// # Errors
    /// Returns [`BonsaiError::InvalidLength`] if the byte count does not
    /// match the algorithm's digest length
    pub fn from_parts(algorithm: HashAlgorithm, bytes: &[u8]) -> Result<Self, BonsaiError> {
        match algorithm {
            HashAlgorithm::Blake3 => Blake3::from_slice(bytes).map(Self::Blake3),
        }
    }

    #[inline]
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Blake3(_) => HashAlgorithm::Blake3,
        }
    }

    /// Borrow the digest bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Blake3(hash) => hash.as_bytes(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        match self {
            Self::Blake3(hash) => hash.short(),
        }
    }
}

impl From<Blake3> for IdHash {
    fn from(hash: Blake3) -> Self {
        Self::Blake3(hash)
    }
}

impl Display for IdHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blake3(hash) => Display::fmt(hash, f),
        }
    }
}

/// Parses a 64-char hex string as a Blake3 hash
impl FromStr for IdHash {
    type Err = BonsaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Blake3>().map(Self::Blake3)
    }
}

fn fixed_from_slice<const N: usize>(
    kind: &'static str,
    bytes: &[u8],
) -> Result<[u8; N], BonsaiError> {
    <[u8; N]>::try_from(bytes).map_err(|_| BonsaiError::InvalidLength {
        kind,
        expected: N,
        actual: bytes.len(),
    })
}

// Serde: hex string for human-readable formats, raw bytes otherwise.

impl serde::Serialize for Blake3 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_fixed(&self.0, serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Blake3 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserialize_fixed(deserializer).map(Self)
    }
}

impl serde::Serialize for Sha1 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_fixed(&self.0, serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Sha1 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserialize_fixed(deserializer).map(Self)
    }
}

fn serialize_fixed<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&hex::encode(bytes))
    } else {
        serializer.serialize_bytes(bytes)
    }
}

fn deserialize_fixed<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct FixedBytesVisitor<const N: usize>(PhantomData<[u8; N]>);

    impl<'de, const N: usize> serde::de::Visitor<'de> for FixedBytesVisitor<N> {
        type Value = [u8; N];

        fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
            write!(formatter, "a {N}-byte hash as hex string or byte array")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let bytes = hex::decode(value).map_err(E::custom)?;
            serde::de::Visitor::visit_bytes(self, &bytes)
        }

        fn visit_bytes<E>(self, value: &[u8]) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            <[u8; N]>::try_from(value).map_err(|_| E::invalid_length(value.len(), &self))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut arr = [0u8; N];
            for (i, byte) in arr.iter_mut().enumerate() {
                *byte = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
            }
            Ok(arr)
        }
    }

    if deserializer.is_human_readable() {
        deserializer.deserialize_str(FixedBytesVisitor::<N>(PhantomData))
    } else {
        deserializer.deserialize_bytes(FixedBytesVisitor::<N>(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_from_slice_valid() {
        let hash = Blake3::from_slice(&[2u8; 32]).unwrap();
        assert_eq!(hash.as_bytes(), &[2u8; 32]);
        assert_eq!(hash.into_bytes(), [2u8; 32]);
    }

    #[test]
    fn blake3_from_slice_invalid_length() {
        let result = Blake3::from_slice(&[1u8; 31]);
        assert!(matches!(
            result,
            Err(BonsaiError::InvalidLength { expected: 32, actual: 31, .. })
        ));
    }

    #[test]
    fn blake3_display_and_parse() {
        let hash = Blake3::new([0xab; 32]);
        let s = hash.to_string();
        assert_eq!(s.len(), 64);
        let parsed: Blake3 = s.parse().unwrap();
        assert_eq!(hash, parsed);
        assert!(s.starts_with(&hash.short()));
    }

    #[test]
    fn blake3_parse_bad_hex() {
        assert!(matches!("zz".parse::<Blake3>(), Err(BonsaiError::InvalidHex(_))));
    }

    #[test]
    fn blake3_ordering_is_bytewise() {
        let mut low = [0u8; 32];
        low[31] = 0xff;
        let mut high = [0u8; 32];
        high[0] = 0x01;
        assert!(Blake3::new(low) < Blake3::new(high));
    }

    #[test]
    fn sha1_length_and_null() {
        assert!(Sha1::NULL.is_null());
        assert!(!Sha1::new([1; 20]).is_null());
        assert!(matches!(
            Sha1::from_slice(&[0u8; 32]),
            Err(BonsaiError::InvalidLength { expected: 20, actual: 32, .. })
        ));
        let parsed: Sha1 = "0101010101010101010101010101010101010101".parse().unwrap();
        assert_eq!(parsed, Sha1::new([1; 20]));
    }

    #[test]
    fn id_hash_from_parts() {
        let hash = IdHash::from_parts(HashAlgorithm::Blake3, &[7u8; 32]).unwrap();
        assert_eq!(hash.algorithm(), HashAlgorithm::Blake3);
        assert_eq!(hash.as_bytes(), &[7u8; 32][..]);
        assert!(IdHash::from_parts(HashAlgorithm::Blake3, &[7u8; 20]).is_err());
    }

    #[test]
    fn algorithm_discriminants_are_stable() {
        assert_eq!(HashAlgorithm::Blake3.discriminant(), 1);
        assert_eq!(HashAlgorithm::from_discriminant(1), Some(HashAlgorithm::Blake3));
        assert_eq!(HashAlgorithm::from_discriminant(0), None);
        assert_eq!(HashAlgorithm::from_discriminant(2), None);
    }

    #[test]
    fn blake3_serde_json() {
        let hash = Blake3::new([9u8; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "09".repeat(32)));
        let decoded: Blake3 = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, decoded);
    }

    #[test]
    fn sha1_serde_rejects_wrong_length() {
        let json = format!("\"{}\"", "00".repeat(32));
        assert!(serde_json::from_str::<Sha1>(&json).is_err());
    }
}
