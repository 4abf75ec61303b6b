//! # Document Model and Bounded Serialization
//!
//! The two documents the protect workflow produces, and the capacity
//! arithmetic that sizes their output buffers before serialization.
//!
//! Both documents are pretty-printed JSON written through a
//! [`BoundedBuffer`]. The capacity is computed first from worst-case
//! field sizes; if the serializer would ever need more, it fails with
//! [`ProtectError::Serialization`] instead of growing the buffer.
//!
//! ## Wire Format
//!
//! Protected model:
//!
//! ```json
//! {
//!   "name": "...",
//!   "description": "...",
//!   "version": "...",
//!   "model_guid": "...",
//!   "isv_certificate": "...",
//!   "files": [
//!     { "file_name_0": "...", "file_body_0": "..." }
//!   ]
//! }
//! ```
//!
//! File indices wrap modulo 100. Master license keys, in order:
//! `creation_date`, `model_hash`, `license_guid`, `model_guid`,
//! `encryption_key`, `isv_certificate`.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use modelseal_core::{
    BoundedBuffer, Guid, ModelHash, ModelMetadata, ProtectError, GUID_SIZE, HASH_SIZE,
    MAX_FILE_NAME, MAX_NAME_SIZE, MAX_VERSION_SIZE,
};

use crate::pipeline::EncryptedArtifact;

/// Worst-case growth of a string under JSON escaping (`\u00XX`).
pub const JSON_ESCAPE_FACTOR: usize = 6;

/// Punctuation, keys, and indentation of a protected model document.
pub const PROTECT_MODEL_BLOB_TEXT_SIZE: usize = 160;

/// Punctuation, keys, and indentation of one `files` entry.
pub const MODEL_FILE_BLOB_TEXT_SIZE: usize = 80;

/// Punctuation, keys, and indentation of a master license document.
pub const MASTER_LICENSE_BLOB_TEXT_SIZE: usize = 160;

/// Upper bound on the wrapped key text a crypto service may return.
pub const MAX_WRAPPED_KEY_SIZE: usize = 512;

/// Upper bound on a rendered creation timestamp.
pub const MAX_TIMESTAMP_SIZE: usize = 64;

const FILE_INDEX_MODULUS: usize = 100;

// ---------------------------------------------------------------------------
// Protected model
// ---------------------------------------------------------------------------

/// The unsigned protected model document.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectedModelDocument<'a> {
    /// Model name.
    pub name: &'a str,
    /// Model description.
    pub description: &'a str,
    /// Model version.
    pub version: &'a str,
    /// GUID minted for this model.
    pub model_guid: Guid,
    /// Certificate of the signing identity.
    pub isv_certificate: &'a str,
    /// Encrypted artifacts in submission order.
    pub files: IndexedFiles<'a>,
}

impl<'a> ProtectedModelDocument<'a> {
    /// Assemble a document from its parts.
    pub fn new(
        metadata: &'a ModelMetadata,
        model_guid: Guid,
        isv_certificate: &'a str,
        files: &'a [EncryptedArtifact],
    ) -> Self {
        Self {
            name: &metadata.name,
            description: &metadata.description,
            version: &metadata.version,
            model_guid,
            isv_certificate,
            files: IndexedFiles(files),
        }
    }
}

/// Artifacts serialized as `[{"file_name_<i>": .., "file_body_<i>": ..}]`.
#[derive(Debug, Clone, Copy)]
pub struct IndexedFiles<'a>(pub &'a [EncryptedArtifact]);

struct IndexedFile<'a> {
    index: usize,
    artifact: &'a EncryptedArtifact,
}

impl Serialize for IndexedFile<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let i = self.index % FILE_INDEX_MODULUS;
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(&format!("file_name_{i}"), &self.artifact.name)?;
        map.serialize_entry(&format!("file_body_{i}"), &self.artifact.ciphertext)?;
        map.end()
    }
}

impl Serialize for IndexedFiles<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (index, artifact) in self.0.iter().enumerate() {
            seq.serialize_element(&IndexedFile { index, artifact })?;
        }
        seq.end()
    }
}

/// Buffer size for a protected model document.
///
/// Fixed text, bounded metadata at the escape factor, the GUID, the
/// certificate at the escape factor, per-artifact overhead (including a
/// worst-case escaped name) times the artifact count, and the ciphertext
/// total. Ciphertext is base64 and never escapes.
pub fn protected_model_capacity(
    certificate_len: usize,
    artifact_count: usize,
    total_ciphertext_len: usize,
) -> Result<usize, ProtectError> {
    let metadata = (2 * MAX_NAME_SIZE + MAX_VERSION_SIZE) * JSON_ESCAPE_FACTOR;
    let per_artifact = MODEL_FILE_BLOB_TEXT_SIZE + MAX_FILE_NAME * JSON_ESCAPE_FACTOR;

    certificate_len
        .checked_mul(JSON_ESCAPE_FACTOR)
        .and_then(|cert| cert.checked_add(PROTECT_MODEL_BLOB_TEXT_SIZE + metadata + GUID_SIZE))
        .and_then(|n| {
            per_artifact
                .checked_mul(artifact_count)
                .and_then(|files| n.checked_add(files))
        })
        .and_then(|n| n.checked_add(total_ciphertext_len))
        .ok_or_else(|| {
            ProtectError::Allocation("protected model document size overflows".to_string())
        })
}

/// Serialize `doc` into a buffer of exactly `capacity` bytes.
pub fn serialize_protected_model(
    doc: &ProtectedModelDocument<'_>,
    capacity: usize,
) -> Result<Vec<u8>, ProtectError> {
    write_bounded(doc, capacity, "protected model")
}

// ---------------------------------------------------------------------------
// Master license
// ---------------------------------------------------------------------------

/// The unauthenticated master license document.
#[derive(Debug, Clone, Serialize)]
pub struct MasterLicenseDocument<'a> {
    /// `ctime`-style creation time.
    pub creation_date: String,
    /// Content hash of the protected model document.
    pub model_hash: ModelHash,
    /// Caller-supplied license identifier, exactly as given.
    pub license_guid: &'a str,
    /// GUID of the protected model.
    pub model_guid: Guid,
    /// Content key wrapped under the identity key.
    #[serde(rename = "encryption_key")]
    pub wrapped_key: &'a str,
    /// Certificate of the wrapping identity.
    pub isv_certificate: &'a str,
}

/// Buffer size for a master license document.
pub fn master_license_capacity(certificate_len: usize) -> Result<usize, ProtectError> {
    let fixed = MASTER_LICENSE_BLOB_TEXT_SIZE
        + MAX_TIMESTAMP_SIZE * JSON_ESCAPE_FACTOR
        + HASH_SIZE
        + 2 * GUID_SIZE
        + MAX_WRAPPED_KEY_SIZE * JSON_ESCAPE_FACTOR;
    certificate_len
        .checked_mul(JSON_ESCAPE_FACTOR)
        .and_then(|cert| cert.checked_add(fixed))
        .ok_or_else(|| ProtectError::Allocation("master license size overflows".to_string()))
}

/// Serialize `doc` into a buffer sized by [`master_license_capacity`].
pub fn serialize_master_license(doc: &MasterLicenseDocument<'_>) -> Result<Vec<u8>, ProtectError> {
    if doc.wrapped_key.len() > MAX_WRAPPED_KEY_SIZE {
        return Err(ProtectError::parameter(format!(
            "wrapped key of {} bytes exceeds {MAX_WRAPPED_KEY_SIZE}",
            doc.wrapped_key.len()
        )));
    }
    if doc.license_guid.len() != GUID_SIZE {
        return Err(ProtectError::parameter(format!(
            "license GUID must be {GUID_SIZE} characters"
        )));
    }
    if doc.creation_date.len() > MAX_TIMESTAMP_SIZE {
        return Err(ProtectError::parameter("creation timestamp too long"));
    }
    let capacity = master_license_capacity(doc.isv_certificate.len())?;
    write_bounded(doc, capacity, "master license")
}

fn write_bounded<T: Serialize>(
    doc: &T,
    capacity: usize,
    what: &str,
) -> Result<Vec<u8>, ProtectError> {
    let mut buf = BoundedBuffer::with_capacity(capacity)?;
    serde_json::to_writer_pretty(&mut buf, doc)
        .map_err(|e| ProtectError::Serialization(format!("{what}: {e}")))?;
    tracing::trace!(what, len = buf.len(), capacity, "serialized document");
    Ok(buf.into_inner())
}
