//! # Error Types: Protect Workflow Taxonomy
//!
//! Every fallible operation in the protect workflow returns a
//! [`ProtectError`]. The variants mirror the five failure classes the
//! CLI reports: parameter, file open, allocation, crypto, serialization.
//!
//! ## Design
//!
//! - Crypto failures name the primitive that failed via [`CryptoOperation`].
//! - Each error maps to an [`ErrorKind`] with a stable numeric code so the
//!   CLI can print a code alongside the failing stage.
//! - No error is swallowed: builders propagate with `?` and the
//!   orchestration attaches the stage at the boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the protect workflow.
#[derive(Error, Debug)]
pub enum ProtectError {
    /// Missing, oversized, or malformed input.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// An input could not be read or an output could not be created.
    #[error("cannot open {}: {source}", path.display())]
    FileOpen {
        /// The path that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A buffer or key slot could not be sized or allocated.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// A cryptographic primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Document assembly failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ProtectError {
    /// Convenience constructor for [`ProtectError::Parameter`].
    pub fn parameter(msg: impl Into<String>) -> Self {
        Self::Parameter(msg.into())
    }

    /// Convenience constructor for [`ProtectError::FileOpen`].
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    /// The failure class of this error.
    ///
    /// Invalid or released key-slot handles are crypto-layer errors but
    /// belong to the parameter class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parameter(_) => ErrorKind::Parameter,
            Self::FileOpen { .. } => ErrorKind::FileOpen,
            Self::Allocation(_) => ErrorKind::Allocation,
            Self::Crypto(e) => e.kind(),
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Stable numeric code reported by the CLI.
    pub fn code(&self) -> u8 {
        self.kind().code()
    }
}

/// Failure class of a [`ProtectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing, oversized, or malformed input.
    Parameter,
    /// Unreadable input or uncreatable output.
    FileOpen,
    /// Buffer sizing or slot allocation failure.
    Allocation,
    /// Cryptographic primitive failure.
    Crypto,
    /// Document assembly failure.
    Serialization,
}

impl ErrorKind {
    /// Stable numeric code for this class.
    pub fn code(&self) -> u8 {
        match self {
            Self::Parameter => 1,
            Self::FileOpen => 2,
            Self::Allocation => 3,
            Self::Crypto => 4,
            Self::Serialization => 5,
        }
    }

    /// Returns the class name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parameter => "parameter",
            Self::FileOpen => "file-open",
            Self::Allocation => "allocation",
            Self::Crypto => "crypto",
            Self::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cryptographic primitive that produced a [`CryptoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoOperation {
    /// Reading the certificate bound to an identity slot.
    CertificateRetrieval,
    /// Certificate signature, key binding, or lifetime check.
    CertificateVerification,
    /// Symmetric encryption of an artifact.
    Encryption,
    /// Symmetric decryption of an artifact.
    Decryption,
    /// Content digest computation.
    Hashing,
    /// Asymmetric signing of a document.
    Signing,
    /// Signature check over a signed envelope.
    SignatureVerification,
    /// Wrapping the content key under the identity key.
    KeyWrap,
    /// Recovering a wrapped content key.
    KeyUnwrap,
    /// Keyed MAC over a document.
    Hmac,
    /// GUID generation.
    GuidGeneration,
    /// Loading an identity key from a keystore.
    KeyLoad,
    /// Generating a symmetric key.
    KeyGeneration,
    /// Key-slot lookup, release, or capability lifecycle.
    SlotManagement,
}

impl CryptoOperation {
    /// Returns the operation name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CertificateRetrieval => "certificate retrieval",
            Self::CertificateVerification => "certificate verification",
            Self::Encryption => "encryption",
            Self::Decryption => "decryption",
            Self::Hashing => "hashing",
            Self::Signing => "signing",
            Self::SignatureVerification => "signature verification",
            Self::KeyWrap => "key wrap",
            Self::KeyUnwrap => "key unwrap",
            Self::Hmac => "hmac",
            Self::GuidGeneration => "guid generation",
            Self::KeyLoad => "key load",
            Self::KeyGeneration => "key generation",
            Self::SlotManagement => "key slot management",
        }
    }
}

impl std::fmt::Display for CryptoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error in a cryptographic capability call.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The named primitive failed.
    #[error("{operation} failed: {detail}")]
    Failed {
        /// Which primitive failed.
        operation: CryptoOperation,
        /// Diagnostic context (never key material).
        detail: String,
    },

    /// A slot handle does not refer to live key material.
    #[error("invalid key slot {slot}: {detail}")]
    InvalidSlot {
        /// The offending slot index.
        slot: u64,
        /// Why the slot was rejected.
        detail: String,
    },

    /// The slot table is full.
    #[error("key slot table exhausted ({live} live slots)")]
    SlotsExhausted {
        /// Live slots at the time of the request.
        live: usize,
    },
}

impl CryptoError {
    /// Convenience constructor for [`CryptoError::Failed`].
    pub fn failed(operation: CryptoOperation, detail: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            detail: detail.into(),
        }
    }

    /// The primitive this error belongs to.
    pub fn operation(&self) -> CryptoOperation {
        match self {
            Self::Failed { operation, .. } => *operation,
            Self::InvalidSlot { .. } | Self::SlotsExhausted { .. } => {
                CryptoOperation::SlotManagement
            }
        }
    }

    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Failed { .. } => ErrorKind::Crypto,
            Self::InvalidSlot { .. } => ErrorKind::Parameter,
            Self::SlotsExhausted { .. } => ErrorKind::Allocation,
        }
    }
}
