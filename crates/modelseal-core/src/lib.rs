//! # modelseal-core: Foundational Types
//!
//! Shared value types for the protect workflow. Every other crate in the
//! workspace depends on `modelseal-core`; it depends on nothing internal.
//!
//! - [`ProtectError`]: the five-class error taxonomy with stable codes.
//! - [`Guid`]: canonical 36-character model and license identifiers.
//! - [`ModelHash`]: fixed-size content digest of a protected model.
//! - [`ModelMetadata`]: bounded name, description, and version.
//! - [`CreationTimestamp`]: `ctime`-style license creation time.
//! - [`BoundedBuffer`]: fixed-capacity writer for documents and envelopes.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod bounded;
pub mod digest;
pub mod error;
pub mod guid;
pub mod metadata;
pub mod temporal;

pub use bounded::BoundedBuffer;
pub use digest::{ModelHash, HASH_BYTES, HASH_SIZE};
pub use error::{CryptoError, CryptoOperation, ErrorKind, ProtectError};
pub use guid::{Guid, GUID_SIZE};
pub use metadata::{
    require_bounded, truncate_bounded, ModelMetadata, MAX_FILE_NAME, MAX_NAME_SIZE,
    MAX_VERSION_SIZE,
};
pub use temporal::CreationTimestamp;
