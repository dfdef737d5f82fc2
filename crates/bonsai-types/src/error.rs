//! Error types for the changeset model
//!
//! Every error here is raised while constructing or validating a value.
//! None of them are transient: resubmitting the same input fails the same
//! way.

use crate::path::TreePath;
use crate::typed_hash::IdDomain;

/// Rejection of a value during construction or validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BonsaiError {
    /// Hash bytes do not match the digest length of their algorithm
    #[error("invalid {kind} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Identifier offered for the wrong hash domain
    #[error("identifier domain mismatch: expected {expected} id, got {actual} id")]
    TypeMismatch { expected: IdDomain, actual: IdDomain },

    /// Numeric field outside its supported range
    #[error("{field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i128,
        min: i128,
        max: i128,
    },

    /// Required attribute was never set
    #[error("missing required field '{0}'")]
    MissingRequiredField(&'static str),

    /// One changed path is a directory of another
    #[error("changed paths conflict: '{prefix}' is a directory of '{path}'")]
    PathConflict { prefix: TreePath, path: TreePath },

    /// Path or path element that cannot be represented
    #[error("malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: &'static str },

    /// Hash string that is not valid hex
    #[error("hex decode error: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl BonsaiError {
    /// Validation failures never succeed on retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }

    pub(crate) fn malformed_path(path: &[u8], reason: &'static str) -> Self {
        Self::MalformedPath {
            path: String::from_utf8_lossy(path).into_owned(),
            reason,
        }
    }

    pub(crate) fn out_of_range(
        field: &'static str,
        value: impl Into<i128>,
        min: impl Into<i128>,
        max: impl Into<i128>,
    ) -> Self {
        Self::OutOfRange {
            field,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_never_retryable() {
        assert!(!BonsaiError::MissingRequiredField("message").is_retryable());
        assert!(!BonsaiError::out_of_range("tz_offset", 46801, -46800, 46800).is_retryable());
    }

    #[test]
    fn out_of_range_message() {
        let err = BonsaiError::out_of_range("tz_offset", 46801, -46800, 46800);
        assert_eq!(err.to_string(), "tz_offset out of range: 46801 not in [-46800, 46800]");
    }

    #[test]
    fn malformed_path_is_lossy() {
        let err = BonsaiError::malformed_path(b"a\xffb", "bad");
        assert!(matches!(
            err,
            BonsaiError::MalformedPath { ref path, .. } if path.contains('\u{fffd}')
        ));
    }

    #[test]
    fn hex_errors_compare_through_wrappers() {
        let err = "zz".parse::<crate::hash::Blake3>().unwrap_err();
        assert_eq!(
            err,
            BonsaiError::InvalidHex(hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 })
        );
        let wrapped = crate::codec::DecodeError::from(err.clone());
        assert_eq!(wrapped, crate::codec::DecodeError::Invalid(err));
    }
}
