//! # modelseal-protect: The Protect Workflow
//!
//! Turns plaintext model artifacts into a signed, encrypted protected
//! model document and derives from it an HMAC-authenticated master
//! license carrying the wrapped content key.
//!
//! - [`pipeline`]: the artifact encryption pipeline.
//! - [`document`]: document shapes and capacity-bounded serialization.
//! - [`context`]: the [`ProtectionContext`] passed between builders.
//! - [`protected_model`]: the protected model document builder.
//! - [`master_license`]: the master license document builder.
//! - [`protect()`]: the end-to-end orchestration with stage reporting.
//!
//! ## Crate Policy
//!
//! - Key material is only ever referenced through
//!   [`KeySlot`](modelseal_crypto::KeySlot) guards.
//! - Outputs are written only after the complete signed or authenticated
//!   buffer exists.

pub mod context;
pub mod document;
pub mod input;
pub mod master_license;
pub mod persist;
pub mod pipeline;
pub mod protect;
pub mod protected_model;

pub use context::ProtectionContext;
pub use document::{MasterLicenseDocument, ProtectedModelDocument};
pub use input::{InputFile, InputFiles};
pub use master_license::MasterLicenseBuilder;
pub use pipeline::{encrypt_all, EncryptedArtifact, EncryptedArtifacts, TrailingByte};
pub use protect::{protect, ProtectOutcome, ProtectRequest, Stage, StageError};
pub use protected_model::ProtectedModelBuilder;
