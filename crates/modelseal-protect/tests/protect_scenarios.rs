//! End-to-end protect scenarios against the software crypto service.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use modelseal_core::{CryptoError, ErrorKind, Guid, ModelHash, ModelMetadata};
use modelseal_crypto::envelope;
use modelseal_crypto::{CryptoService, SlotId, SoftwareCryptoService, SoftwareKeystore};
use modelseal_protect::{protect, ProtectRequest, Stage, TrailingByte};

const LICENSE: &str = "0f8e7d6c-5b4a-4938-a7b6-c5d4e3f2a1b0";

/// Software service that counts every capability call.
struct CountingService {
    inner: SoftwareCryptoService,
    calls: AtomicUsize,
}

impl CountingService {
    fn new() -> Self {
        Self {
            inner: SoftwareCryptoService::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl CryptoService for CountingService {
    fn init(&self) -> Result<(), CryptoError> {
        self.tick();
        self.inner.init()
    }
    fn deinit(&self) {
        self.tick();
        self.inner.deinit()
    }
    fn load_asymmetric_key(&self, keystore: &Path) -> Result<SlotId, CryptoError> {
        self.tick();
        self.inner.load_asymmetric_key(keystore)
    }
    fn generate_symmetric_key(&self, size: usize) -> Result<SlotId, CryptoError> {
        self.tick();
        self.inner.generate_symmetric_key(size)
    }
    fn clear_key_slot(&self, slot: SlotId) {
        self.tick();
        self.inner.clear_key_slot(slot)
    }
    fn get_certificate(&self, slot: SlotId) -> Result<String, CryptoError> {
        self.tick();
        self.inner.get_certificate(slot)
    }
    fn verify_certificate(
        &self,
        slot: SlotId,
        is_peer: bool,
        certificate: &str,
        check_lifetime: bool,
    ) -> Result<(), CryptoError> {
        self.tick();
        self.inner
            .verify_certificate(slot, is_peer, certificate, check_lifetime)
    }
    fn encrypt(&self, slot: SlotId, plaintext: &[u8]) -> Result<(String, SlotId), CryptoError> {
        self.tick();
        self.inner.encrypt(slot, plaintext)
    }
    fn compute_hash(&self, data: &[u8]) -> Result<ModelHash, CryptoError> {
        self.tick();
        self.inner.compute_hash(data)
    }
    fn sign(&self, slot: SlotId, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.tick();
        self.inner.sign(slot, data)
    }
    fn wrap_key(
        &self,
        identity: SlotId,
        content: SlotId,
    ) -> Result<(String, SlotId), CryptoError> {
        self.tick();
        self.inner.wrap_key(identity, content)
    }
    fn hmac(&self, slot: SlotId, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.tick();
        self.inner.hmac(slot, data)
    }
    fn generate_guid(&self) -> Result<Guid, CryptoError> {
        self.tick();
        self.inner.generate_guid()
    }
}

struct Workspace {
    dir: tempfile::TempDir,
    keystore: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let keystore = dir.path().join("isv.json");
        SoftwareKeystore::generate("isv", 30)
            .unwrap()
            .save(&keystore)
            .unwrap();
        Self { dir, keystore }
    }

    fn file(&self, name: &str, body: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn request(&self, inputs: Vec<PathBuf>) -> ProtectRequest {
        ProtectRequest {
            inputs,
            metadata: ModelMetadata::new("m", "d", "1"),
            keystore: self.keystore.clone(),
            protected_model: self.dir.path().join("m.dat"),
            master_license: self.dir.path().join("m.masterlic"),
            output_dir: None,
            license_guid: LICENSE.to_string(),
            trailing_byte: TrailingByte::Strip,
        }
    }
}

#[test]
fn protects_two_files_end_to_end() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let b = ws.file("B.bin", &[b'B'; 20]);
    let req = ws.request(vec![a, b]);
    let service = SoftwareCryptoService::new();

    let outcome = protect(&service, &req).unwrap();
    assert_eq!(outcome.artifact_count, 2);
    assert_eq!(outcome.license_guid.to_canonical(), LICENSE);
    assert_eq!(service.live_slot_count(), 0);

    let model = std::fs::read(&req.protected_model).unwrap();
    let model_env = envelope::open(&model).unwrap();
    assert_eq!(service.compute_hash(model_env.data).unwrap(), outcome.model_hash);

    let doc: serde_json::Value = serde_json::from_slice(model_env.data).unwrap();
    assert_eq!(doc["model_guid"], outcome.model_guid.to_canonical());
    assert_eq!(doc["files"][0]["file_name_0"], "A.xml");
    assert_eq!(doc["files"][1]["file_name_1"], "B.bin");
    let cert = doc["isv_certificate"].as_str().unwrap().to_string();
    service.verify_signature(&cert, &model).unwrap();

    let license = std::fs::read(&req.master_license).unwrap();
    let lic: serde_json::Value =
        serde_json::from_slice(envelope::open(&license).unwrap().data).unwrap();
    assert_eq!(lic["license_guid"], LICENSE);
    assert_eq!(lic["model_guid"], outcome.model_guid.to_canonical());
    assert_eq!(lic["model_hash"], outcome.model_hash.to_hex());
}

#[test]
fn wrapped_key_decrypts_every_artifact() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", b"<net>layers</net>\n");
    let b = ws.file("B.bin", b"\x00\x01\x02\x03weights\x00");
    let req = ws.request(vec![a, b]);
    let service = SoftwareCryptoService::new();
    protect(&service, &req).unwrap();

    let model = std::fs::read(&req.protected_model).unwrap();
    let doc: serde_json::Value =
        serde_json::from_slice(envelope::open(&model).unwrap().data).unwrap();
    let license = std::fs::read(&req.master_license).unwrap();
    let lic_env = envelope::open(&license).unwrap();
    let lic: serde_json::Value = serde_json::from_slice(lic_env.data).unwrap();

    service.init().unwrap();
    let identity = service.load_asymmetric_key(&req.keystore).unwrap();
    let (content, derived) = service
        .unwrap_key(identity, lic["encryption_key"].as_str().unwrap())
        .unwrap();
    service.verify_hmac(derived, &license).unwrap();

    let first = service
        .decrypt(content, doc["files"][0]["file_body_0"].as_str().unwrap())
        .unwrap();
    let second = service
        .decrypt(content, doc["files"][1]["file_body_1"].as_str().unwrap())
        .unwrap();
    assert_eq!(first.as_slice(), b"<net>layers</net>");
    assert_eq!(second.as_slice(), b"\x00\x01\x02\x03weights");
    service.deinit();
}

#[test]
fn keep_policy_preserves_final_byte() {
    let ws = Workspace::new();
    let a = ws.file("w.bin", b"exact\x7f");
    let mut req = ws.request(vec![a]);
    req.trailing_byte = TrailingByte::Keep;
    let service = SoftwareCryptoService::new();
    protect(&service, &req).unwrap();

    let model = std::fs::read(&req.protected_model).unwrap();
    let doc: serde_json::Value =
        serde_json::from_slice(envelope::open(&model).unwrap().data).unwrap();
    let license = std::fs::read(&req.master_license).unwrap();
    let lic: serde_json::Value =
        serde_json::from_slice(envelope::open(&license).unwrap().data).unwrap();

    service.init().unwrap();
    let identity = service.load_asymmetric_key(&req.keystore).unwrap();
    let (content, _) = service
        .unwrap_key(identity, lic["encryption_key"].as_str().unwrap())
        .unwrap();
    let plain = service
        .decrypt(content, doc["files"][0]["file_body_0"].as_str().unwrap())
        .unwrap();
    assert_eq!(plain.as_slice(), b"exact\x7f");
}

#[test]
fn empty_model_name_has_no_side_effects() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let mut req = ws.request(vec![a]);
    req.metadata.name.clear();
    let service = CountingService::new();

    let err = protect(&service, &req).unwrap_err();
    assert_eq!(err.stage, Stage::ValidateRequest);
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert_eq!(service.calls(), 0);
    assert!(!req.protected_model.exists());
    assert!(!req.master_license.exists());
}

#[test]
fn malformed_license_guid_never_wraps() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let mut req = ws.request(vec![a]);
    req.license_guid = "0f8e7d6c-5b4a-4938-a7b6-c5d4e3f2a1bZ".to_string();
    let service = CountingService::new();

    let err = protect(&service, &req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert_eq!(service.calls(), 0);
}

#[test]
fn unreadable_input_fails_protected_model_stage() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let missing = ws.dir.path().join("missing.bin");
    let req = ws.request(vec![a, missing]);
    let service = SoftwareCryptoService::new();

    let err = protect(&service, &req).unwrap_err();
    assert_eq!(err.stage, Stage::ProtectedModel);
    assert_eq!(err.kind(), ErrorKind::FileOpen);
    assert_eq!(err.code(), 2);
    assert_eq!(service.live_slot_count(), 0);
    assert!(!req.protected_model.exists());
    assert!(!req.master_license.exists());
}

#[test]
fn bad_keystore_fails_load_stage() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let mut req = ws.request(vec![a]);
    req.keystore = ws.dir.path().join("absent.json");
    let service = SoftwareCryptoService::new();

    let err = protect(&service, &req).unwrap_err();
    assert_eq!(err.stage, Stage::LoadIdentityKey);
    assert_eq!(err.kind(), ErrorKind::Crypto);
    assert_eq!(service.live_slot_count(), 0);
}

#[test]
fn license_failure_keeps_protected_model() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let mut req = ws.request(vec![a]);
    req.master_license = ws.dir.path().join("no/such/dir/m.masterlic");
    let service = SoftwareCryptoService::new();

    let err = protect(&service, &req).unwrap_err();
    assert_eq!(err.stage, Stage::MasterLicense);
    assert_eq!(err.kind(), ErrorKind::FileOpen);
    assert!(req.protected_model.exists());
    assert_eq!(service.live_slot_count(), 0);
}

#[test]
fn repeated_runs_mint_distinct_model_guids() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let req = ws.request(vec![a]);
    let service = SoftwareCryptoService::new();
    let first = protect(&service, &req).unwrap();
    let second = protect(&service, &req).unwrap();
    assert_ne!(first.model_guid, second.model_guid);
    assert_eq!(first.license_guid, second.license_guid);
}

#[test]
fn uppercase_license_guid_is_written_verbatim() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let mut req = ws.request(vec![a]);
    req.license_guid = "50934A64-5D1B-4655-BCB4-80080FCB8858".to_string();
    let service = SoftwareCryptoService::new();
    protect(&service, &req).unwrap();

    let license = std::fs::read(&req.master_license).unwrap();
    let lic: serde_json::Value =
        serde_json::from_slice(envelope::open(&license).unwrap().data).unwrap();
    assert_eq!(lic["license_guid"], "50934A64-5D1B-4655-BCB4-80080FCB8858");
}

#[test]
fn relative_outputs_land_in_output_dir() {
    let ws = Workspace::new();
    let a = ws.file("A.xml", &[b'A'; 10]);
    let out = ws.dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let mut req = ws.request(vec![a]);
    req.protected_model = PathBuf::from("m.dat");
    req.master_license = PathBuf::from("m.masterlic");
    req.output_dir = Some(out.clone());
    let service = SoftwareCryptoService::new();

    let outcome = protect(&service, &req).unwrap();
    assert_eq!(outcome.protected_model, out.join("m.dat"));
    assert_eq!(outcome.master_license, out.join("m.masterlic"));
    assert!(out.join("m.dat").exists());
    assert!(out.join("m.masterlic").exists());
}
