//! # Protected Model Document Builder
//!
//! Encrypts the model artifacts, assembles them with the model metadata
//! and the signer's certificate, hashes and signs the result, and writes
//! the signed document.
//!
//! ## Ordering
//!
//! 1. Validate name, description, and version (no crypto touched yet).
//! 2. Fetch the identity certificate and verify it as the slot's own,
//!    with lifetime checking.
//! 3. Encrypt every artifact.
//! 4. Mint the model GUID.
//! 5. Size the buffer, then serialize.
//! 6. Hash the serialized bytes.
//! 7. Sign.
//! 8. Write the signed form.
//!
//! The output file is written only once the full signed buffer exists, so
//! a failure never leaves a half-written document behind.

use std::path::{Path, PathBuf};

use modelseal_core::{ModelMetadata, ProtectError};
use modelseal_crypto::{KeySlot, KeySlotManager};

use crate::context::ProtectionContext;
use crate::document::{protected_model_capacity, serialize_protected_model, ProtectedModelDocument};
use crate::input::InputFiles;
use crate::persist;
use crate::pipeline::{encrypt_all, TrailingByte};

/// Builds and writes a signed protected model document.
#[derive(Debug, Clone)]
pub struct ProtectedModelBuilder {
    output: PathBuf,
    trailing_byte: TrailingByte,
}

impl ProtectedModelBuilder {
    /// A builder writing to `output`.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            trailing_byte: TrailingByte::default(),
        }
    }

    /// Select the plaintext terminator policy.
    pub fn trailing_byte(mut self, policy: TrailingByte) -> Self {
        self.trailing_byte = policy;
        self
    }

    /// Destination path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run the build. Returns the populated context and the signed bytes
    /// that were written.
    pub fn build(
        &self,
        slots: &KeySlotManager<'_>,
        identity: &KeySlot<'_>,
        content: &KeySlot<'_>,
        inputs: &InputFiles,
        metadata: &ModelMetadata,
    ) -> Result<(ProtectionContext, Vec<u8>), ProtectError> {
        metadata.validate()?;
        let service = slots.service();

        let identity_id = identity.id()?;
        let certificate = service.get_certificate(identity_id)?;
        let mut context = ProtectionContext::new(certificate);
        service.verify_certificate(identity_id, false, context.certificate(), true)?;
        tracing::debug!(certificate_len = context.certificate_len(), "identity certificate verified");

        let encrypted = encrypt_all(slots, content, inputs, self.trailing_byte)?;
        tracing::info!(
            artifacts = encrypted.len(),
            ciphertext_bytes = encrypted.total_len,
            "encrypted model artifacts"
        );

        let model_guid = service.generate_guid()?;
        context.record_model_guid(model_guid);

        let capacity = protected_model_capacity(
            context.certificate_len(),
            encrypted.len(),
            encrypted.total_len,
        )?;
        let document = ProtectedModelDocument::new(
            metadata,
            model_guid,
            context.certificate(),
            &encrypted.artifacts,
        );
        let serialized = serialize_protected_model(&document, capacity)?;

        let model_hash = service.compute_hash(&serialized)?;
        context.record_model_hash(model_hash);

        let signed = service.sign(identity_id, &serialized)?;
        persist::write_output(&self.output, &signed)?;

        tracing::info!(
            path = %self.output.display(),
            %model_guid,
            %model_hash,
            "protected model written"
        );
        Ok((context, signed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelseal_core::ErrorKind;
    use modelseal_crypto::{
        envelope, CryptoService, CryptoSession, SoftwareCryptoService, SoftwareKeystore,
    };

    struct Fixture {
        dir: tempfile::TempDir,
        keystore: PathBuf,
        inputs: InputFiles,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let keystore = dir.path().join("isv.json");
        SoftwareKeystore::generate("isv", 30)
            .unwrap()
            .save(&keystore)
            .unwrap();
        let a = dir.path().join("A.xml");
        let b = dir.path().join("B.bin");
        std::fs::write(&a, [b'a'; 10]).unwrap();
        std::fs::write(&b, [b'b'; 20]).unwrap();
        Fixture {
            inputs: InputFiles::new([a, b]),
            keystore,
            dir,
        }
    }

    #[test]
    fn builds_signed_document_and_context() {
        let fx = fixture();
        let out = fx.dir.path().join("model.dat");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&fx.keystore).unwrap();
        let content = slots.generate_content_key(32).unwrap();

        let (ctx, signed) = ProtectedModelBuilder::new(&out)
            .build(&slots, &identity, &content, &fx.inputs, &ModelMetadata::new("m", "d", "1"))
            .unwrap();

        assert!(ctx.is_complete());
        assert!(ctx.certificate_len() > 0);
        assert_eq!(ctx.model_guid().unwrap().to_canonical().len(), 36);
        assert_eq!(std::fs::read(&out).unwrap(), signed);

        let env = envelope::open(&signed).unwrap();
        assert_eq!(service.compute_hash(env.data).unwrap(), ctx.model_hash().unwrap());
        service.verify_signature(ctx.certificate(), &signed).unwrap();
        // Identity and content only; per-file slots are gone.
        assert_eq!(service.live_slot_count(), 2);
    }

    #[test]
    fn empty_name_fails_before_crypto_or_io() {
        let fx = fixture();
        let out = fx.dir.path().join("model.dat");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&fx.keystore).unwrap();
        let content = slots.generate_content_key(32).unwrap();

        let err = ProtectedModelBuilder::new(&out)
            .build(&slots, &identity, &content, &fx.inputs, &ModelMetadata::new("", "d", "1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(!out.exists());
        assert_eq!(service.live_slot_count(), 2);
    }

    #[test]
    fn missing_input_leaves_no_output() {
        let fx = fixture();
        let out = fx.dir.path().join("model.dat");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&fx.keystore).unwrap();
        let content = slots.generate_content_key(32).unwrap();
        let inputs = InputFiles::new([fx.dir.path().join("nope.bin")]);

        let err = ProtectedModelBuilder::new(&out)
            .build(&slots, &identity, &content, &inputs, &ModelMetadata::new("m", "d", "1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileOpen);
        assert!(!out.exists());
        assert_eq!(service.live_slot_count(), 2);
    }

    #[test]
    fn overwrites_existing_output() {
        let fx = fixture();
        let out = fx.dir.path().join("model.dat");
        std::fs::write(&out, b"stale").unwrap();
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&fx.keystore).unwrap();
        let content = slots.generate_content_key(32).unwrap();

        let (_, signed) = ProtectedModelBuilder::new(&out)
            .build(&slots, &identity, &content, &fx.inputs, &ModelMetadata::new("m", "d", "1"))
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), signed);
    }
}
