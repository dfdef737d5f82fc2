//! Store configuration

use bonsai_types::DecodeConfig;
use serde::{Deserialize, Serialize};

/// Changeset store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// First component of every blobstore key
    pub key_prefix: String,
    /// Recompute ids and re-encode on every read
    pub verify_on_read: bool,
    /// Limits applied when decoding fetched bytes
    pub decode: DecodeConfig,
}

impl StoreConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_verify_on_read(mut self, verify: bool) -> Self {
        self.verify_on_read = verify;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_decode(mut self, decode: DecodeConfig) -> Self {
        self.decode = decode;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "bonsai".to_owned(),
            verify_on_read: true,
            decode: DecodeConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::new();
        assert_eq!(config.key_prefix, "bonsai");
        assert!(config.verify_on_read);
        assert_eq!(config.decode, DecodeConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"key_prefix":"repo0000","decode":{"max_entries":10}}"#;
        let config: StoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.key_prefix, "repo0000");
        assert!(config.verify_on_read);
        assert_eq!(config.decode.max_entries, 10);
        assert_eq!(config.decode.max_path_depth, DecodeConfig::default().max_path_depth);
    }
}
