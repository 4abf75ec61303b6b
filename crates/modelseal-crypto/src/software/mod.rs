//! # Software Crypto Service
//!
//! In-process [`CryptoService`] backed by audited RustCrypto primitives:
//!
//! - **Identity**: Ed25519 (`ed25519-dalek`) loaded from a
//!   [`SoftwareKeystore`], certified by a [`SelfCertificate`].
//! - **Content encryption**: a 256-bit content key never encrypts
//!   directly. Each call draws a random salt and expands the key with
//!   HKDF-SHA256 into a derived slot (cipher key, nonce, MAC key); the
//!   artifact is sealed with ChaCha20-Poly1305 under the derived cipher
//!   key. Output is `base64(salt || ciphertext || tag)`.
//! - **Key wrap**: the same construction with the identity seed as input
//!   keying material and the content key as plaintext.
//! - **MAC**: HMAC-SHA256 under the MAC key of a derived slot.
//! - **Hash**: SHA-256, rendered as 64 hex characters.
//!
//! ## Security Invariants
//!
//! - Key material lives only in the slot table. Every slot variant
//!   zeroizes on drop, and clearing a slot drops it immediately.
//! - Slot ids come from a monotonic counter and are never reused, so a
//!   stale id can never alias newer material.
//! - At most [`MAX_KEY_SLOTS`] slots are live; the next request fails with
//!   [`CryptoError::SlotsExhausted`].
//! - `Debug` prints slot counts, never key bytes.

pub mod certificate;
pub mod keystore;

use std::collections::HashMap;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use modelseal_core::{CryptoError, CryptoOperation, Guid, ModelHash};

use crate::envelope::{self, EnvelopeKind};
use crate::service::{CryptoService, KeyRole, SlotId};

pub use certificate::SelfCertificate;
pub use keystore::SoftwareKeystore;

type HmacSha256 = Hmac<Sha256>;

/// Maximum number of simultaneously live key slots.
pub const MAX_KEY_SLOTS: usize = 64;

pub use crate::service::CONTENT_KEY_SIZE;

/// Random salt prefixed to every ciphertext.
pub const SALT_LEN: usize = 16;

const NONCE_LEN: usize = 12;
const DERIVED_LEN: usize = 32 + NONCE_LEN + 32;

const CONTENT_INFO: &[u8] = b"modelseal/content/v1";
const WRAP_INFO: &[u8] = b"modelseal/key-wrap/v1";

// ---------------------------------------------------------------------------
// Slot material (internal)
// ---------------------------------------------------------------------------

/// Per-operation keys expanded from a content or identity key.
#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKeys {
    cipher_key: [u8; 32],
    nonce: [u8; NONCE_LEN],
    mac_key: [u8; 32],
}

impl DerivedKeys {
    fn expand(
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        operation: CryptoOperation,
    ) -> Result<Self, CryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = Zeroizing::new([0u8; DERIVED_LEN]);
        hk.expand(info, &mut okm[..])
            .map_err(|e| CryptoError::failed(operation, format!("key derivation: {e}")))?;

        let mut keys = Self {
            cipher_key: [0u8; 32],
            nonce: [0u8; NONCE_LEN],
            mac_key: [0u8; 32],
        };
        keys.cipher_key.copy_from_slice(&okm[..32]);
        keys.nonce.copy_from_slice(&okm[32..32 + NONCE_LEN]);
        keys.mac_key.copy_from_slice(&okm[32 + NONCE_LEN..]);
        Ok(keys)
    }

    fn seal(&self, plaintext: &[u8], operation: CryptoOperation) -> Result<Vec<u8>, CryptoError> {
        ChaCha20Poly1305::new(Key::from_slice(&self.cipher_key))
            .encrypt(Nonce::from_slice(&self.nonce), plaintext)
            .map_err(|_| CryptoError::failed(operation, "AEAD seal failed"))
    }

    fn unseal(
        &self,
        ciphertext: &[u8],
        operation: CryptoOperation,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        ChaCha20Poly1305::new(Key::from_slice(&self.cipher_key))
            .decrypt(Nonce::from_slice(&self.nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::failed(operation, "authentication tag mismatch"))
    }

    fn mac(&self, data: &[u8]) -> Result<[u8; 32], CryptoError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac_key)
            .map_err(|e| CryptoError::failed(CryptoOperation::Hmac, e.to_string()))?;
        mac.update(data);
        let mut tag = [0u8; 32];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        Ok(tag)
    }
}

enum SlotMaterial {
    Identity {
        signing_key: SigningKey,
        certificate: String,
    },
    Symmetric(Zeroizing<[u8; CONTENT_KEY_SIZE]>),
    Derived(DerivedKeys),
}

impl SlotMaterial {
    fn role(&self) -> KeyRole {
        match self {
            Self::Identity { .. } => KeyRole::Identity,
            Self::Symmetric(_) => KeyRole::Content,
            Self::Derived(_) => KeyRole::Derived,
        }
    }
}

#[derive(Default)]
struct SlotTable {
    initialized: bool,
    next: u64,
    live: HashMap<SlotId, SlotMaterial>,
}

impl SlotTable {
    fn ensure_capacity(&self, needed: usize) -> Result<(), CryptoError> {
        if !self.initialized {
            return Err(CryptoError::failed(
                CryptoOperation::SlotManagement,
                "crypto service is not initialised",
            ));
        }
        if self.live.len() + needed > MAX_KEY_SLOTS {
            return Err(CryptoError::SlotsExhausted {
                live: self.live.len(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, material: SlotMaterial) -> Result<SlotId, CryptoError> {
        self.ensure_capacity(1)?;
        self.next += 1;
        let id = SlotId(self.next);
        tracing::trace!(slot = %id, role = %material.role(), "slot allocated");
        self.live.insert(id, material);
        Ok(id)
    }

    fn get(&self, slot: SlotId, expected: KeyRole) -> Result<&SlotMaterial, CryptoError> {
        let material = self.live.get(&slot).ok_or_else(|| CryptoError::InvalidSlot {
            slot: slot.0,
            detail: "no live key material".to_string(),
        })?;
        if material.role() != expected {
            return Err(CryptoError::InvalidSlot {
                slot: slot.0,
                detail: format!("expected {expected} key, found {}", material.role()),
            });
        }
        Ok(material)
    }

    fn identity(&self, slot: SlotId) -> Result<(&SigningKey, &str), CryptoError> {
        match self.get(slot, KeyRole::Identity)? {
            SlotMaterial::Identity {
                signing_key,
                certificate,
            } => Ok((signing_key, certificate)),
            _ => Err(CryptoError::InvalidSlot {
                slot: slot.0,
                detail: "expected identity key".to_string(),
            }),
        }
    }

    fn symmetric(&self, slot: SlotId) -> Result<&[u8; CONTENT_KEY_SIZE], CryptoError> {
        match self.get(slot, KeyRole::Content)? {
            SlotMaterial::Symmetric(key) => Ok(&**key),
            _ => Err(CryptoError::InvalidSlot {
                slot: slot.0,
                detail: "expected content key".to_string(),
            }),
        }
    }

    fn derived(&self, slot: SlotId) -> Result<&DerivedKeys, CryptoError> {
        match self.get(slot, KeyRole::Derived)? {
            SlotMaterial::Derived(keys) => Ok(keys),
            _ => Err(CryptoError::InvalidSlot {
                slot: slot.0,
                detail: "expected derived key".to_string(),
            }),
        }
    }
}

fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

fn split_salted(text: &str, operation: CryptoOperation) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let raw = STANDARD
        .decode(text.trim())
        .map_err(|e| CryptoError::failed(operation, format!("base64: {e}")))?;
    if raw.len() < SALT_LEN {
        return Err(CryptoError::failed(operation, "ciphertext shorter than salt"));
    }
    let (salt, body) = raw.split_at(SALT_LEN);
    Ok((salt.to_vec(), body.to_vec()))
}

// ---------------------------------------------------------------------------
// SoftwareCryptoService
// ---------------------------------------------------------------------------

/// In-process crypto capability with a mutex-guarded slot table.
pub struct SoftwareCryptoService {
    table: Mutex<SlotTable>,
}

impl SoftwareCryptoService {
    /// Create an uninitialised service with an empty slot table.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(SlotTable::default()),
        }
    }

    /// Number of slots currently holding key material.
    pub fn live_slot_count(&self) -> usize {
        self.table.lock().live.len()
    }

    /// Recover the plaintext of an [`encrypt`](CryptoService::encrypt)
    /// output using the content key in `slot`.
    pub fn decrypt(
        &self,
        slot: SlotId,
        ciphertext: &str,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let op = CryptoOperation::Decryption;
        let (salt, body) = split_salted(ciphertext, op)?;
        let table = self.table.lock();
        let key = table.symmetric(slot)?;
        DerivedKeys::expand(key, &salt, CONTENT_INFO, op)?.unseal(&body, op)
    }

    /// Recover a wrapped content key into a new content slot.
    ///
    /// Returns the content slot and the derived slot of the unwrap, both
    /// owned by the caller.
    pub fn unwrap_key(
        &self,
        identity: SlotId,
        wrapped: &str,
    ) -> Result<(SlotId, SlotId), CryptoError> {
        let op = CryptoOperation::KeyUnwrap;
        let (salt, body) = split_salted(wrapped, op)?;
        let mut table = self.table.lock();
        table.ensure_capacity(2)?;

        let (signing_key, _) = table.identity(identity)?;
        let seed = Zeroizing::new(signing_key.to_bytes());
        let derived = DerivedKeys::expand(seed.as_slice(), &salt, WRAP_INFO, op)?;
        let plain = derived.unseal(&body, op)?;
        let key: [u8; CONTENT_KEY_SIZE] = plain
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::failed(op, "wrapped key has the wrong length"))?;

        let content = table.insert(SlotMaterial::Symmetric(Zeroizing::new(key)))?;
        let derived = table.insert(SlotMaterial::Derived(derived))?;
        Ok((content, derived))
    }

    /// Verify a signed envelope against the public key in `certificate`.
    pub fn verify_signature(&self, certificate: &str, sealed: &[u8]) -> Result<(), CryptoError> {
        let op = CryptoOperation::SignatureVerification;
        let cert = SelfCertificate::from_pem(certificate)?;
        let env = envelope::open(sealed).map_err(|e| CryptoError::failed(op, e.to_string()))?;
        if env.kind != EnvelopeKind::Signature {
            return Err(CryptoError::failed(op, format!("expected signature, found {}", env.kind)));
        }
        let mut sig = [0u8; 64];
        hex::decode_to_slice(env.tag, &mut sig)
            .map_err(|e| CryptoError::failed(op, format!("signature hex: {e}")))?;
        cert.verifying_key()?
            .verify_strict(env.data, &Signature::from_bytes(&sig))
            .map_err(|_| CryptoError::failed(op, "signature does not verify"))
    }

    /// Verify an authenticated envelope against the MAC key in `slot`.
    pub fn verify_hmac(&self, slot: SlotId, sealed: &[u8]) -> Result<(), CryptoError> {
        let op = CryptoOperation::Hmac;
        let env = envelope::open(sealed).map_err(|e| CryptoError::failed(op, e.to_string()))?;
        if env.kind != EnvelopeKind::Hmac {
            return Err(CryptoError::failed(op, format!("expected HMAC, found {}", env.kind)));
        }
        let mut expected = [0u8; 32];
        hex::decode_to_slice(env.tag, &mut expected)
            .map_err(|e| CryptoError::failed(op, format!("tag hex: {e}")))?;
        let computed = self.table.lock().derived(slot)?.mac(env.data)?;
        if bool::from(computed[..].ct_eq(&expected[..])) {
            Ok(())
        } else {
            Err(CryptoError::failed(op, "HMAC does not verify"))
        }
    }
}

impl Default for SoftwareCryptoService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SoftwareCryptoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        f.debug_struct("SoftwareCryptoService")
            .field("initialized", &table.initialized)
            .field("live_slots", &table.live.len())
            .finish()
    }
}

impl CryptoService for SoftwareCryptoService {
    fn init(&self) -> Result<(), CryptoError> {
        self.table.lock().initialized = true;
        Ok(())
    }

    fn deinit(&self) {
        let mut table = self.table.lock();
        let cleared = table.live.len();
        table.live.clear();
        table.initialized = false;
        if cleared > 0 {
            tracing::debug!(cleared, "cleared leftover key slots on deinit");
        }
    }

    fn load_asymmetric_key(&self, keystore: &Path) -> Result<SlotId, CryptoError> {
        self.table.lock().ensure_capacity(1)?;
        let store = SoftwareKeystore::load(keystore)?;
        let id = self.table.lock().insert(SlotMaterial::Identity {
            signing_key: store.signing_key(),
            certificate: store.certificate().to_string(),
        })?;
        tracing::debug!(slot = %id, identity = store.name(), "loaded identity key");
        Ok(id)
    }

    fn generate_symmetric_key(&self, size: usize) -> Result<SlotId, CryptoError> {
        if size != CONTENT_KEY_SIZE {
            return Err(CryptoError::failed(
                CryptoOperation::KeyGeneration,
                format!("unsupported key size {size}, expected {CONTENT_KEY_SIZE}"),
            ));
        }
        let mut key = Zeroizing::new([0u8; CONTENT_KEY_SIZE]);
        OsRng.fill_bytes(key.as_mut_slice());
        self.table.lock().insert(SlotMaterial::Symmetric(key))
    }

    fn clear_key_slot(&self, slot: SlotId) {
        if self.table.lock().live.remove(&slot).is_some() {
            tracing::trace!(%slot, "slot cleared");
        }
    }

    fn get_certificate(&self, slot: SlotId) -> Result<String, CryptoError> {
        let table = self.table.lock();
        let (_, certificate) = table.identity(slot)?;
        Ok(certificate.to_string())
    }

    fn verify_certificate(
        &self,
        slot: SlotId,
        is_peer: bool,
        certificate: &str,
        check_lifetime: bool,
    ) -> Result<(), CryptoError> {
        let cert = SelfCertificate::from_pem(certificate)?;
        cert.verify_self_signature()?;
        if check_lifetime {
            cert.check_lifetime(chrono::Utc::now())?;
        }
        let table = self.table.lock();
        let (signing_key, _) = table.identity(slot)?;
        if !is_peer && !cert.binds(&signing_key.verifying_key()) {
            return Err(CryptoError::failed(
                CryptoOperation::CertificateVerification,
                "certificate does not belong to the loaded identity key",
            ));
        }
        Ok(())
    }

    fn encrypt(&self, slot: SlotId, plaintext: &[u8]) -> Result<(String, SlotId), CryptoError> {
        let op = CryptoOperation::Encryption;
        let salt = random_salt();
        let mut table = self.table.lock();
        table.ensure_capacity(1)?;
        let derived = DerivedKeys::expand(table.symmetric(slot)?, &salt, CONTENT_INFO, op)?;
        let sealed = derived.seal(plaintext, op)?;

        let mut out = Vec::with_capacity(SALT_LEN + sealed.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&sealed);
        let id = table.insert(SlotMaterial::Derived(derived))?;
        Ok((STANDARD.encode(out), id))
    }

    fn compute_hash(&self, data: &[u8]) -> Result<ModelHash, CryptoError> {
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Ok(ModelHash::from_bytes(bytes))
    }

    fn sign(&self, slot: SlotId, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signature = {
            let table = self.table.lock();
            let (signing_key, _) = table.identity(slot)?;
            signing_key.sign(data).to_bytes()
        };
        envelope::seal(data, EnvelopeKind::Signature, &hex::encode(signature))
            .map_err(|e| CryptoError::failed(CryptoOperation::Signing, e.to_string()))
    }

    fn wrap_key(
        &self,
        identity: SlotId,
        content: SlotId,
    ) -> Result<(String, SlotId), CryptoError> {
        let op = CryptoOperation::KeyWrap;
        let salt = random_salt();
        let mut table = self.table.lock();
        table.ensure_capacity(1)?;

        let (signing_key, _) = table.identity(identity)?;
        let seed = Zeroizing::new(signing_key.to_bytes());
        let derived = DerivedKeys::expand(seed.as_slice(), &salt, WRAP_INFO, op)?;
        let sealed = derived.seal(table.symmetric(content)?.as_slice(), op)?;

        let mut out = Vec::with_capacity(SALT_LEN + sealed.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&sealed);
        let id = table.insert(SlotMaterial::Derived(derived))?;
        Ok((STANDARD.encode(out), id))
    }

    fn hmac(&self, slot: SlotId, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let tag = self.table.lock().derived(slot)?.mac(data)?;
        envelope::seal(data, EnvelopeKind::Hmac, &hex::encode(tag))
            .map_err(|e| CryptoError::failed(CryptoOperation::Hmac, e.to_string()))
    }

    fn generate_guid(&self) -> Result<Guid, CryptoError> {
        Ok(Guid::new_random())
    }
}
