//! # Artifact Encryption Pipeline
//!
//! Reads each input file in submission order, encrypts it under the
//! content key, and collects the results with their running ciphertext
//! total.
//!
//! ## Invariants
//!
//! - Output length equals input length and order is preserved. Any single
//!   failure aborts the whole run; nothing is silently skipped.
//! - Each encryption yields a derived key slot. Its guard is dropped at
//!   the end of the iteration that created it, so every derived slot is
//!   cleared before the next file is read and before an error returns.
//! - Plaintext buffers are zeroized when dropped.

use serde::Deserialize;

use modelseal_core::ProtectError;
use modelseal_crypto::{KeySlot, KeySlotManager};

use crate::input::InputFiles;
use crate::persist;

/// How the last byte of each input file is treated.
///
/// Input files were historically text blobs with a trailing terminator,
/// and the plaintext excluded that final byte. `Strip` keeps that
/// convention; `Keep` encrypts the file exactly as stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingByte {
    /// Drop the final byte (an empty file stays empty).
    #[default]
    Strip,
    /// Encrypt every byte.
    Keep,
}

impl TrailingByte {
    /// Number of plaintext bytes taken from a file of `file_len` bytes.
    pub fn plaintext_len(&self, file_len: usize) -> usize {
        match self {
            Self::Strip => file_len.saturating_sub(1),
            Self::Keep => file_len,
        }
    }
}

/// One encrypted input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedArtifact {
    /// Bounded base name of the source file.
    pub name: String,
    /// Ciphertext text produced by the crypto service.
    pub ciphertext: String,
}

/// The pipeline result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptedArtifacts {
    /// Artifacts in submission order.
    pub artifacts: Vec<EncryptedArtifact>,
    /// Sum of ciphertext lengths in bytes.
    pub total_len: usize,
}

impl EncryptedArtifacts {
    /// Number of artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if there are no artifacts.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Encrypt every input file under `content`.
///
/// An empty input list yields an empty collection with zero total length.
///
/// # Errors
///
/// - [`ProtectError::FileOpen`] if an input cannot be read.
/// - [`ProtectError::Allocation`] if the ciphertext total overflows.
/// - [`ProtectError::Crypto`] if the service rejects the encryption.
pub fn encrypt_all(
    slots: &KeySlotManager<'_>,
    content: &KeySlot<'_>,
    inputs: &InputFiles,
    trailing_byte: TrailingByte,
) -> Result<EncryptedArtifacts, ProtectError> {
    let mut out = EncryptedArtifacts {
        artifacts: Vec::with_capacity(inputs.len()),
        total_len: 0,
    };

    for file in inputs {
        let contents = persist::read_input(&file.path)?;
        let plaintext = &contents[..trailing_byte.plaintext_len(contents.len())];

        let (ciphertext, _derived) = slots.encrypt(content, plaintext)?;
        out.total_len = out.total_len.checked_add(ciphertext.len()).ok_or_else(|| {
            ProtectError::Allocation("total ciphertext length overflows".to_string())
        })?;

        tracing::debug!(
            ordinal = file.ordinal,
            path = %file.path.display(),
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "encrypted artifact"
        );
        out.artifacts.push(EncryptedArtifact {
            name: file.artifact_name(),
            ciphertext,
        });
    }

    Ok(out)
}
