//! # Master License Document Builder
//!
//! Wraps the content key under the identity key and binds it, with the
//! license GUID, to the model GUID and hash recorded in a completed
//! [`ProtectionContext`]. The document is authenticated with an HMAC
//! keyed by the slot the wrap operation derived, then written.
//!
//! ## Security Invariant
//!
//! The content key slot is taken by value. It and the wrap-derived slot
//! are both cleared before [`MasterLicenseBuilder::build`] returns, on
//! success and on every failure path.

use std::path::{Path, PathBuf};

use modelseal_core::{CreationTimestamp, Guid, ProtectError};
use modelseal_crypto::{KeySlot, KeySlotManager};

use crate::context::ProtectionContext;
use crate::document::{serialize_master_license, MasterLicenseDocument};
use crate::persist;

/// Builds and writes an HMAC-authenticated master license.
#[derive(Debug, Clone)]
pub struct MasterLicenseBuilder {
    output: PathBuf,
}

impl MasterLicenseBuilder {
    /// A builder writing to `output`.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    /// Destination path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run the build. Returns the authenticated bytes that were written.
    pub fn build(
        &self,
        slots: &KeySlotManager<'_>,
        identity: &KeySlot<'_>,
        content: KeySlot<'_>,
        license_guid: &str,
        context: &ProtectionContext,
    ) -> Result<Vec<u8>, ProtectError> {
        self.build_with_clock(
            slots,
            identity,
            content,
            license_guid,
            context,
            CreationTimestamp::now,
        )
    }

    /// [`build`](Self::build) with an explicit creation time.
    pub fn build_at(
        &self,
        slots: &KeySlotManager<'_>,
        identity: &KeySlot<'_>,
        content: KeySlot<'_>,
        license_guid: &str,
        context: &ProtectionContext,
        created: CreationTimestamp,
    ) -> Result<Vec<u8>, ProtectError> {
        self.build_with_clock(
            slots,
            identity,
            content,
            license_guid,
            context,
            move || created,
        )
    }

    /// [`build`](Self::build) reading the creation time from `clock`.
    ///
    /// The clock is read once, after the content key has been wrapped, and
    /// not at all if validation or the wrap fails. The license GUID is
    /// validated but recorded exactly as given.
    pub fn build_with_clock(
        &self,
        slots: &KeySlotManager<'_>,
        identity: &KeySlot<'_>,
        mut content: KeySlot<'_>,
        license_guid: &str,
        context: &ProtectionContext,
        clock: impl FnOnce() -> CreationTimestamp,
    ) -> Result<Vec<u8>, ProtectError> {
        Guid::parse(license_guid)?;
        let (model_guid, model_hash) = context.require_complete()?;

        let (wrapped_key, derived) = slots.wrap_key(identity, &content)?;
        let created = clock();
        let document = MasterLicenseDocument {
            creation_date: created.to_ctime(),
            model_hash,
            license_guid,
            model_guid,
            wrapped_key: &wrapped_key,
            isv_certificate: context.certificate(),
        };
        let serialized = serialize_master_license(&document)?;
        let authenticated = slots.service().hmac(derived.id()?, &serialized)?;

        drop(derived);
        content.release();

        persist::write_output(&self.output, &authenticated)?;
        tracing::info!(
            path = %self.output.display(),
            %license_guid,
            %model_guid,
            "master license written"
        );
        Ok(authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use chrono::TimeZone;
    use modelseal_core::{ErrorKind, ModelHash};
    use modelseal_crypto::{
        envelope, CryptoService, CryptoSession, SoftwareCryptoService, SoftwareKeystore,
    };

    const LICENSE: &str = "2b6f4c1e-8a3d-4f5b-9c7e-1d2a3b4c5d6e";

    fn keystore(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("isv.json");
        SoftwareKeystore::generate("isv", 30)
            .unwrap()
            .save(&path)
            .unwrap();
        path
    }

    fn completed_context(certificate: String) -> ProtectionContext {
        let mut ctx = ProtectionContext::new(certificate);
        ctx.record_model_guid(Guid::new_random());
        ctx.record_model_hash(ModelHash::from_bytes([0x5a; 32]));
        ctx
    }

    #[test]
    fn license_binds_context_values() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("model.masterlic");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&keystore(&dir)).unwrap();
        let content = slots.generate_content_key(32).unwrap();
        let ctx = completed_context(service.get_certificate(identity.id().unwrap()).unwrap());

        let created = CreationTimestamp::from_utc(
            chrono::Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 0).unwrap(),
        );
        let bytes = MasterLicenseBuilder::new(&out)
            .build_at(&slots, &identity, content, LICENSE, &ctx, created)
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), bytes);

        let env = envelope::open(&bytes).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(env.data).unwrap();
        assert_eq!(doc["license_guid"], LICENSE);
        assert_eq!(doc["model_guid"], ctx.model_guid().unwrap().to_canonical());
        assert_eq!(doc["model_hash"], ctx.model_hash().unwrap().to_hex());
        assert_eq!(doc["creation_date"], "Thu Oct 15 09:30:00 2026");
        assert_eq!(doc["isv_certificate"], ctx.certificate());
        // Content and wrap-derived slots are both gone.
        assert_eq!(service.live_slot_count(), 1);
    }

    #[test]
    fn malformed_guid_fails_without_wrapping() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("model.masterlic");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&keystore(&dir)).unwrap();
        let content = slots.generate_content_key(32).unwrap();
        let ctx = completed_context("CERT".to_string());

        let err = MasterLicenseBuilder::new(&out)
            .build(&slots, &identity, content, "not-a-guid", &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(!out.exists());
        assert_eq!(service.live_slot_count(), 1);
    }

    #[test]
    fn uppercase_license_guid_is_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("model.masterlic");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&keystore(&dir)).unwrap();
        let content = slots.generate_content_key(32).unwrap();
        let ctx = completed_context("CERT".to_string());

        let upper = "50934A64-5D1B-4655-BCB4-80080FCB8858";
        let created = CreationTimestamp::from_utc(
            chrono::Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 0).unwrap(),
        );
        let bytes = MasterLicenseBuilder::new(&out)
            .build_at(&slots, &identity, content, upper, &ctx, created)
            .unwrap();
        let doc: serde_json::Value =
            serde_json::from_slice(envelope::open(&bytes).unwrap().data).unwrap();
        assert_eq!(doc["license_guid"], upper);
    }

    #[test]
    fn clock_is_not_read_when_guid_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("model.masterlic");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&keystore(&dir)).unwrap();
        let content = slots.generate_content_key(32).unwrap();
        let ctx = completed_context("CERT".to_string());

        let read = Cell::new(false);
        let err = MasterLicenseBuilder::new(&out)
            .build_with_clock(&slots, &identity, content, "not-a-guid", &ctx, || {
                read.set(true);
                CreationTimestamp::now()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(!read.get());
    }

    #[test]
    fn clock_is_not_read_when_wrap_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("model.masterlic");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&keystore(&dir)).unwrap();
        let mut content = slots.generate_content_key(32).unwrap();
        content.release();
        let ctx = completed_context("CERT".to_string());

        let read = Cell::new(false);
        let result = MasterLicenseBuilder::new(&out).build_with_clock(
            &slots,
            &identity,
            content,
            LICENSE,
            &ctx,
            || {
                read.set(true);
                CreationTimestamp::now()
            },
        );
        assert!(result.is_err());
        assert!(!read.get());
        assert!(!out.exists());
    }

    #[test]
    fn clock_is_read_once_after_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("model.masterlic");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&keystore(&dir)).unwrap();
        let content = slots.generate_content_key(32).unwrap();
        let ctx = completed_context("CERT".to_string());

        let reads = Cell::new(0u32);
        MasterLicenseBuilder::new(&out)
            .build_with_clock(&slots, &identity, content, LICENSE, &ctx, || {
                reads.set(reads.get() + 1);
                // content key plus the wrap-derived slot are live here
                assert_eq!(service.live_slot_count(), 3);
                CreationTimestamp::now()
            })
            .unwrap();
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn incomplete_context_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("model.masterlic");
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&keystore(&dir)).unwrap();
        let content = slots.generate_content_key(32).unwrap();
        let ctx = ProtectionContext::new("CERT".to_string());

        let err = MasterLicenseBuilder::new(&out)
            .build(&slots, &identity, content, LICENSE, &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert_eq!(service.live_slot_count(), 1);
    }

    #[test]
    fn uncreatable_output_still_releases_slots() {
        let dir = tempfile::tempdir().unwrap();
        let service = SoftwareCryptoService::new();
        let session = CryptoSession::open(&service).unwrap();
        let slots = session.slots();
        let identity = slots.acquire_identity_key(&keystore(&dir)).unwrap();
        let content = slots.generate_content_key(32).unwrap();
        let ctx = completed_context("CERT".to_string());

        let err = MasterLicenseBuilder::new(dir.path().join("missing/dir/lic"))
            .build(&slots, &identity, content, LICENSE, &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileOpen);
        assert_eq!(service.live_slot_count(), 1);
    }
}
