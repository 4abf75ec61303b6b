//! # modelseal-crypto: Crypto Capability
//!
//! Everything the protect workflow needs from cryptography, behind one
//! object-safe trait:
//!
//! - [`CryptoService`]: the slot-based capability (load, generate, clear,
//!   certificate, encrypt, hash, sign, wrap, HMAC, GUID).
//! - [`KeySlot`] and [`KeySlotManager`]: scoped slot ownership. Every
//!   slot is cleared on every exit path.
//! - [`CryptoSession`]: scoped `init`/`deinit`.
//! - [`envelope`]: the armour format shared by signed and MAC'd documents.
//! - [`software`]: the in-process backend (Ed25519, HKDF-SHA256,
//!   ChaCha20-Poly1305, HMAC-SHA256, SHA-256).
//!
//! ## Crate Policy
//!
//! - Depends only on `modelseal-core` internally.
//! - Tests use real primitives and real keystores on disk. Nothing is
//!   mocked.
//! - No `unsafe` code.

pub mod envelope;
pub mod service;
pub mod slot;
pub mod software;

pub use envelope::{Envelope, EnvelopeKind, MAX_SIGNATURE_SIZE, SIGNATURE_BLOB_TEXT_SIZE};
pub use service::{CryptoService, KeyRole, SlotId, CONTENT_KEY_SIZE};
pub use slot::{CryptoSession, KeySlot, KeySlotManager};
pub use software::{SelfCertificate, SoftwareCryptoService, SoftwareKeystore};
