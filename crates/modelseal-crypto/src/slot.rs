//! # Key Slot Manager
//!
//! Scoped ownership of key slots. Every slot the protect workflow obtains
//! is wrapped in a [`KeySlot`] guard the moment it leaves the
//! [`CryptoService`], and the guard clears the slot when dropped. Early
//! returns, `?` propagation, and panics all run the release.
//!
//! ## Security Invariants
//!
//! - A released guard refuses to hand out its id ([`KeySlot::id`] errors),
//!   so a stale handle cannot reach the service.
//! - [`KeySlot::release`] is idempotent; the drop after an explicit
//!   release is a no-op.
//! - [`CryptoSession`] pairs `init` with `deinit` the same way. Declare it
//!   before any slot so slots drop first.

use std::path::Path;

use modelseal_core::CryptoError;

use crate::service::{CryptoService, KeyRole, SlotId};

/// Owning handle to one key slot. Clears the slot on drop.
pub struct KeySlot<'s> {
    service: &'s dyn CryptoService,
    id: SlotId,
    role: KeyRole,
    released: bool,
}

impl<'s> KeySlot<'s> {
    /// Take ownership of a slot the service just created.
    pub fn adopt(service: &'s dyn CryptoService, id: SlotId, role: KeyRole) -> Self {
        tracing::debug!(slot = %id, %role, "leased key slot");
        Self {
            service,
            id,
            role,
            released: false,
        }
    }

    /// The slot id, or an error once the slot has been released.
    pub fn id(&self) -> Result<SlotId, CryptoError> {
        if self.released {
            return Err(CryptoError::InvalidSlot {
                slot: self.id.0,
                detail: format!("{} slot already released", self.role),
            });
        }
        Ok(self.id)
    }

    /// What this slot holds.
    pub fn role(&self) -> KeyRole {
        self.role
    }

    /// Whether the slot has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Zeroize the underlying material. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.service.clear_key_slot(self.id);
        self.released = true;
        tracing::debug!(slot = %self.id, role = %self.role, "released key slot");
    }
}

impl Drop for KeySlot<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for KeySlot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySlot")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("released", &self.released)
            .finish()
    }
}

/// Leases slots from a [`CryptoService`] as [`KeySlot`] guards.
///
/// Operations that derive a slot return it already wrapped, so there is
/// no window in which a derived slot is unowned.
#[derive(Clone, Copy)]
pub struct KeySlotManager<'s> {
    service: &'s dyn CryptoService,
}

impl<'s> KeySlotManager<'s> {
    /// Create a manager over `service`.
    pub fn new(service: &'s dyn CryptoService) -> Self {
        Self { service }
    }

    /// The underlying capability.
    pub fn service(&self) -> &'s dyn CryptoService {
        self.service
    }

    /// Load the identity key from `keystore`.
    pub fn acquire_identity_key(&self, keystore: &Path) -> Result<KeySlot<'s>, CryptoError> {
        let id = self.service.load_asymmetric_key(keystore)?;
        Ok(KeySlot::adopt(self.service, id, KeyRole::Identity))
    }

    /// Generate a content key of `size` bytes.
    pub fn generate_content_key(&self, size: usize) -> Result<KeySlot<'s>, CryptoError> {
        let id = self.service.generate_symmetric_key(size)?;
        Ok(KeySlot::adopt(self.service, id, KeyRole::Content))
    }

    /// Release `slot` now rather than at end of scope.
    pub fn release(&self, slot: &mut KeySlot<'_>) {
        slot.release();
    }

    /// Encrypt `plaintext` under `content`, returning the ciphertext and
    /// the derived slot.
    pub fn encrypt(
        &self,
        content: &KeySlot<'_>,
        plaintext: &[u8],
    ) -> Result<(String, KeySlot<'s>), CryptoError> {
        let (ciphertext, derived) = self.service.encrypt(content.id()?, plaintext)?;
        Ok((ciphertext, KeySlot::adopt(self.service, derived, KeyRole::Derived)))
    }

    /// Wrap `content` under `identity`, returning the wrapped key text and
    /// the derived slot.
    pub fn wrap_key(
        &self,
        identity: &KeySlot<'_>,
        content: &KeySlot<'_>,
    ) -> Result<(String, KeySlot<'s>), CryptoError> {
        let (wrapped, derived) = self.service.wrap_key(identity.id()?, content.id()?)?;
        Ok((wrapped, KeySlot::adopt(self.service, derived, KeyRole::Derived)))
    }
}

impl std::fmt::Debug for KeySlotManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeySlotManager")
    }
}

/// Scoped `init`/`deinit` of a [`CryptoService`].
pub struct CryptoSession<'s> {
    service: &'s dyn CryptoService,
    open: bool,
}

impl<'s> CryptoSession<'s> {
    /// Initialise `service` for the lifetime of the returned guard.
    pub fn open(service: &'s dyn CryptoService) -> Result<Self, CryptoError> {
        service.init()?;
        tracing::debug!("crypto session opened");
        Ok(Self {
            service,
            open: true,
        })
    }

    /// A slot manager bound to this session's service.
    pub fn slots(&self) -> KeySlotManager<'s> {
        KeySlotManager::new(self.service)
    }

    /// Deinitialise now rather than at end of scope.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.open {
            self.service.deinit();
            self.open = false;
            tracing::debug!("crypto session closed");
        }
    }
}

impl Drop for CryptoSession<'_> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
