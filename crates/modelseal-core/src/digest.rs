//! # Model Hash: Fixed-Size Content Digest
//!
//! The protected model document is hashed once, over the exact bytes of
//! its data section, and the digest is embedded in the master license.
//! The digest is computed by the crypto capability; this module only
//! defines the value type and its text form.
//!
//! The text form is 64 lowercase hex characters (SHA-256).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtectError;

/// Raw digest length in bytes.
pub const HASH_BYTES: usize = 32;

/// Length of the hex text form.
pub const HASH_SIZE: usize = HASH_BYTES * 2;

/// A model content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHash([u8; HASH_BYTES]);

impl ModelHash {
    /// Create a hash from raw digest bytes.
    pub fn from_bytes(bytes: [u8; HASH_BYTES]) -> Self {
        Self(bytes)
    }

    /// Return the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_BYTES] {
        &self.0
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, ProtectError> {
        if s.len() != HASH_SIZE {
            return Err(ProtectError::parameter(format!(
                "model hash must be {HASH_SIZE} hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; HASH_BYTES];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| ProtectError::parameter(format!("invalid model hash hex: {e}")))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for ModelHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModelHash({}...)", &self.to_hex()[..8])
    }
}

impl std::fmt::Display for ModelHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ModelHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ModelHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
