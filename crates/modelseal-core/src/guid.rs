//! # GUIDs: Model and License Identifiers
//!
//! Both the model GUID (generated per protect run) and the license GUID
//! (supplied by the caller) travel as canonical 36-character strings:
//! `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, lowercase or uppercase hex.
//!
//! `uuid` alone accepts braced, URN, and unhyphenated forms; those are
//! rejected here because the documents embed the string verbatim.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::ProtectError;

/// Length of a canonical GUID string.
pub const GUID_SIZE: usize = 36;

/// A GUID in canonical hyphenated form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(Uuid);

impl Guid {
    /// Generate a new random (v4) GUID.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a canonical 36-character GUID.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectError::Parameter`] for any other length, misplaced
    /// hyphens, or non-hex digits.
    pub fn parse(s: &str) -> Result<Self, ProtectError> {
        if s.len() != GUID_SIZE {
            return Err(ProtectError::parameter(format!(
                "GUID must be {GUID_SIZE} characters, got {}",
                s.len()
            )));
        }
        let well_formed = s.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        });
        if !well_formed {
            return Err(ProtectError::parameter(format!("malformed GUID: {s:?}")));
        }
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|e| ProtectError::parameter(format!("malformed GUID {s:?}: {e}")))
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Render as the canonical lowercase hyphenated string.
    pub fn to_canonical(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for Guid {
    type Err = ProtectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical())
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
