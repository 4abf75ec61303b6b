//! # Model Metadata and Text Bounds
//!
//! The human-readable fields of a protected model (name, description,
//! version) and the byte limits applied to every bounded text value in
//! the documents.

use serde::{Deserialize, Serialize};

use crate::error::ProtectError;

/// Maximum bytes of a model name, model description, or artifact name.
pub const MAX_NAME_SIZE: usize = 256;

/// Maximum bytes of a model version.
pub const MAX_VERSION_SIZE: usize = 32;

/// Maximum bytes of any input or output path.
pub const MAX_FILE_NAME: usize = 256;

/// Name, description, and version of the model being protected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name, at most [`MAX_NAME_SIZE`] bytes.
    pub name: String,
    /// Free-form description, at most [`MAX_NAME_SIZE`] bytes.
    pub description: String,
    /// Version label, at most [`MAX_VERSION_SIZE`] bytes.
    pub version: String,
}

impl ModelMetadata {
    /// Create metadata without validating it.
    ///
    /// Validation happens in [`ModelMetadata::validate`] so that callers
    /// can decide when a failure is reported.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: version.into(),
        }
    }

    /// Check that every field is present and within its bound.
    pub fn validate(&self) -> Result<(), ProtectError> {
        require_bounded("model name", &self.name, MAX_NAME_SIZE)?;
        require_bounded("model description", &self.description, MAX_NAME_SIZE)?;
        require_bounded("model version", &self.version, MAX_VERSION_SIZE)?;
        Ok(())
    }
}

/// Reject an empty value or one longer than `max` bytes.
pub fn require_bounded(field: &str, value: &str, max: usize) -> Result<(), ProtectError> {
    if value.is_empty() {
        return Err(ProtectError::parameter(format!("{field} is required")));
    }
    if value.len() > max {
        return Err(ProtectError::parameter(format!(
            "{field} greater than {max} characters not allowed (got {})",
            value.len()
        )));
    }
    Ok(())
}

/// Truncate `value` to at most `max` bytes without splitting a character.
pub fn truncate_bounded(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
