//! # Crypto Capability
//!
//! The protect workflow never touches key bytes. It asks a
//! [`CryptoService`] to perform each primitive against an opaque
//! [`SlotId`], and the service keeps the material in its own slot table.
//!
//! ## Contract
//!
//! - Slot ids are never reused. A cleared id stays invalid forever.
//! - `clear_key_slot` zeroizes the material and is a no-op for unknown or
//!   already-cleared ids.
//! - Operations that derive a new slot (`encrypt`, `wrap_key`) create it
//!   only on success, so a failed call never leaks a slot.
//! - `deinit` clears every live slot.
//!
//! The trait is object-safe; callers hold `&dyn CryptoService`.

use std::path::Path;

use modelseal_core::{CryptoError, Guid, ModelHash};

/// Size in bytes of the symmetric content key the protect workflow
/// requests.
pub const CONTENT_KEY_SIZE: usize = 32;

/// Opaque handle to key material held by a [`CryptoService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a key slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// Asymmetric identity key with its certificate.
    Identity,
    /// Symmetric content key that encrypts model artifacts.
    Content,
    /// Per-operation key/IV/MAC-key set derived by encrypt or key wrap.
    Derived,
}

impl std::fmt::Display for KeyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::Content => f.write_str("content"),
            Self::Derived => f.write_str("derived"),
        }
    }
}

/// Capability interface for every primitive the protect workflow uses.
pub trait CryptoService: Send + Sync {
    /// Set up process-wide crypto state. Idempotent.
    fn init(&self) -> Result<(), CryptoError>;

    /// Tear down process-wide crypto state, clearing all live slots.
    fn deinit(&self);

    /// Load the identity key from a keystore into a new slot.
    fn load_asymmetric_key(&self, keystore: &Path) -> Result<SlotId, CryptoError>;

    /// Generate a fresh symmetric key of `size` bytes into a new slot.
    fn generate_symmetric_key(&self, size: usize) -> Result<SlotId, CryptoError>;

    /// Zeroize and forget a slot.
    fn clear_key_slot(&self, slot: SlotId);

    /// Certificate bound to an identity slot.
    fn get_certificate(&self, slot: SlotId) -> Result<String, CryptoError>;

    /// Verify `certificate` against the identity in `slot`.
    ///
    /// With `is_peer == false` the certificate must belong to the slot's
    /// own key. With `check_lifetime` the validity window is enforced.
    fn verify_certificate(
        &self,
        slot: SlotId,
        is_peer: bool,
        certificate: &str,
        check_lifetime: bool,
    ) -> Result<(), CryptoError>;

    /// Encrypt `plaintext` under the content key in `slot`.
    ///
    /// Returns the ciphertext text and a derived key/IV/MAC slot that the
    /// caller owns and must clear.
    fn encrypt(&self, slot: SlotId, plaintext: &[u8]) -> Result<(String, SlotId), CryptoError>;

    /// Fixed-size digest of `data`.
    fn compute_hash(&self, data: &[u8]) -> Result<ModelHash, CryptoError>;

    /// Sign `data` with the identity key, returning the signed envelope.
    fn sign(&self, slot: SlotId, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Wrap the content key in `content` under the identity key in
    /// `identity`.
    ///
    /// Returns the wrapped key text and a derived key/IV/MAC slot that
    /// the caller owns and must clear.
    fn wrap_key(&self, identity: SlotId, content: SlotId)
        -> Result<(String, SlotId), CryptoError>;

    /// Authenticate `data` with the MAC key of a derived slot, returning
    /// the authenticated envelope.
    fn hmac(&self, slot: SlotId, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// A fresh canonical GUID.
    fn generate_guid(&self) -> Result<Guid, CryptoError>;
}
