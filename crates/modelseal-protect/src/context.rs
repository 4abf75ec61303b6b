//! # Protection Context
//!
//! The state one protect invocation carries from the protected model
//! builder into the master license builder: the signer's certificate,
//! the model GUID, and the model content hash.
//!
//! The builder populates it incrementally (certificate first, then GUID,
//! then hash). The license builder only reads it and refuses to run
//! until [`ProtectionContext::is_complete`] holds. The certificate text
//! is zeroized when the context is dropped.

use zeroize::Zeroizing;

use modelseal_core::{Guid, ModelHash, ProtectError};

/// Cross-step state of one protect invocation.
pub struct ProtectionContext {
    certificate: Zeroizing<String>,
    model_guid: Option<Guid>,
    model_hash: Option<ModelHash>,
}

impl ProtectionContext {
    /// Start a context from the signer's certificate.
    pub fn new(certificate: String) -> Self {
        Self {
            certificate: Zeroizing::new(certificate),
            model_guid: None,
            model_hash: None,
        }
    }

    /// Certificate text.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// Certificate length in bytes.
    pub fn certificate_len(&self) -> usize {
        self.certificate.len()
    }

    pub fn model_guid(&self) -> Option<Guid> {
        self.model_guid
    }

    pub fn model_hash(&self) -> Option<ModelHash> {
        self.model_hash
    }

    pub fn record_model_guid(&mut self, guid: Guid) {
        self.model_guid = Some(guid);
    }

    pub fn record_model_hash(&mut self, hash: ModelHash) {
        self.model_hash = Some(hash);
    }

    /// Certificate present and GUID and hash recorded.
    pub fn is_complete(&self) -> bool {
        !self.certificate.is_empty() && self.model_guid.is_some() && self.model_hash.is_some()
    }

    /// The GUID and hash, or a parameter error naming what is missing.
    pub fn require_complete(&self) -> Result<(Guid, ModelHash), ProtectError> {
        if self.certificate.is_empty() {
            return Err(ProtectError::parameter("protection context has no certificate"));
        }
        let guid = self
            .model_guid
            .ok_or_else(|| ProtectError::parameter("protection context has no model GUID"))?;
        let hash = self
            .model_hash
            .ok_or_else(|| ProtectError::parameter("protection context has no model hash"))?;
        Ok((guid, hash))
    }
}

impl std::fmt::Debug for ProtectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionContext")
            .field("certificate_len", &self.certificate_len())
            .field("model_guid", &self.model_guid)
            .field("model_hash", &self.model_hash)
            .finish()
    }
}
