//! # Protect Orchestration
//!
//! One call runs the whole protocol against a [`CryptoService`]:
//!
//! 1. Validate the request (bounds, GUID syntax, non-empty inputs).
//! 2. Open a crypto session and load the identity key.
//! 3. Generate the content key.
//! 4. Build the protected model, producing the [`ProtectionContext`].
//! 5. Build the master license from that context.
//!
//! Every slot is a guard declared after the session, so all slots are
//! cleared before `deinit` runs, whichever stage fails. Failures carry the
//! [`Stage`] they happened in.

use std::path::{Path, PathBuf};

use thiserror::Error;

use modelseal_core::{
    require_bounded, ErrorKind, Guid, ModelHash, ModelMetadata, ProtectError, GUID_SIZE,
    MAX_FILE_NAME,
};
use modelseal_crypto::{CryptoService, CryptoSession, CONTENT_KEY_SIZE};

use crate::input::InputFiles;
use crate::master_license::MasterLicenseBuilder;
use crate::pipeline::TrailingByte;
use crate::protected_model::ProtectedModelBuilder;

/// Everything one protect invocation needs.
#[derive(Debug, Clone)]
pub struct ProtectRequest {
    /// Model artifact files, in order.
    pub inputs: Vec<PathBuf>,
    /// Name, description, and version.
    pub metadata: ModelMetadata,
    /// Keystore holding the identity key.
    pub keystore: PathBuf,
    /// Where to write the signed protected model, as given.
    pub protected_model: PathBuf,
    /// Where to write the authenticated master license, as given.
    pub master_license: PathBuf,
    /// Directory that relative output paths are written under.
    pub output_dir: Option<PathBuf>,
    /// Caller-supplied license GUID.
    pub license_guid: String,
    /// Plaintext terminator policy.
    pub trailing_byte: TrailingByte,
}

impl ProtectRequest {
    /// Check every bounded field without touching crypto or the
    /// filesystem.
    pub fn validate(&self) -> Result<(), ProtectError> {
        if self.inputs.is_empty() {
            return Err(ProtectError::parameter("at least one model file is required"));
        }
        for input in &self.inputs {
            require_bounded("model file path", &input.to_string_lossy(), MAX_FILE_NAME)?;
        }
        self.metadata.validate()?;
        require_bounded("keystore path", &self.keystore.to_string_lossy(), MAX_FILE_NAME)?;
        require_bounded(
            "protected model path",
            &self.protected_model.to_string_lossy(),
            MAX_FILE_NAME,
        )?;
        require_bounded(
            "master license path",
            &self.master_license.to_string_lossy(),
            MAX_FILE_NAME,
        )?;
        require_bounded("license GUID", &self.license_guid, GUID_SIZE)?;
        Guid::parse(&self.license_guid)?;
        Ok(())
    }

    /// Protected model destination after applying [`output_dir`](Self::output_dir).
    pub fn protected_model_path(&self) -> PathBuf {
        self.resolve_output(&self.protected_model)
    }

    /// Master license destination after applying [`output_dir`](Self::output_dir).
    pub fn master_license_path(&self) -> PathBuf {
        self.resolve_output(&self.master_license)
    }

    // The path bounds above apply to the paths as given; the output
    // directory is joined on afterwards.
    fn resolve_output(&self, path: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Stage of the protocol an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Request validation.
    ValidateRequest,
    /// Crypto initialisation and identity key load.
    LoadIdentityKey,
    /// Content key generation.
    GenerateContentKey,
    /// Protected model document build.
    ProtectedModel,
    /// Master license document build.
    MasterLicense,
}

impl Stage {
    /// Returns the stage name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateRequest => "validate request",
            Self::LoadIdentityKey => "load identity key",
            Self::GenerateContentKey => "generate content key",
            Self::ProtectedModel => "protect model",
            Self::MasterLicense => "create master license",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`ProtectError`] tagged with the stage that produced it.
#[derive(Error, Debug)]
#[error("{stage} failed: {error}")]
pub struct StageError {
    /// Where the failure happened.
    pub stage: Stage,
    /// What went wrong.
    #[source]
    pub error: ProtectError,
}

impl StageError {
    /// Failure class of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Stable numeric code of the underlying error.
    pub fn code(&self) -> u8 {
        self.error.code()
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<ProtectError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError {
            stage,
            error: e.into(),
        })
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectOutcome {
    /// GUID minted for the model.
    pub model_guid: Guid,
    /// Content hash of the protected model document.
    pub model_hash: ModelHash,
    /// License GUID bound into the master license.
    pub license_guid: Guid,
    /// Number of artifacts protected.
    pub artifact_count: usize,
    /// Path of the protected model.
    pub protected_model: PathBuf,
    /// Path of the master license.
    pub master_license: PathBuf,
}

/// Run the full protect protocol.
pub fn protect(
    service: &dyn CryptoService,
    request: &ProtectRequest,
) -> Result<ProtectOutcome, StageError> {
    request.validate().at(Stage::ValidateRequest)?;
    let license_guid = Guid::parse(&request.license_guid).at(Stage::ValidateRequest)?;
    let inputs = InputFiles::new(&request.inputs);

    let session = CryptoSession::open(service).at(Stage::LoadIdentityKey)?;
    let slots = session.slots();
    let identity = slots
        .acquire_identity_key(&request.keystore)
        .at(Stage::LoadIdentityKey)?;
    tracing::info!(keystore = %request.keystore.display(), "identity key loaded");

    let content = slots
        .generate_content_key(CONTENT_KEY_SIZE)
        .at(Stage::GenerateContentKey)?;

    let protected_model = request.protected_model_path();
    let master_license = request.master_license_path();

    let (context, _) = ProtectedModelBuilder::new(&protected_model)
        .trailing_byte(request.trailing_byte)
        .build(&slots, &identity, &content, &inputs, &request.metadata)
        .at(Stage::ProtectedModel)?;

    MasterLicenseBuilder::new(&master_license)
        .build(&slots, &identity, content, &request.license_guid, &context)
        .at(Stage::MasterLicense)?;

    let (model_guid, model_hash) = context.require_complete().at(Stage::MasterLicense)?;
    Ok(ProtectOutcome {
        model_guid,
        model_hash,
        license_guid,
        artifact_count: inputs.len(),
        protected_model,
        master_license,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProtectRequest {
        ProtectRequest {
            inputs: vec![PathBuf::from("a.bin")],
            metadata: ModelMetadata::new("m", "d", "1"),
            keystore: PathBuf::from("isv.json"),
            protected_model: PathBuf::from("m.dat"),
            master_license: PathBuf::from("m.masterlic"),
            output_dir: None,
            license_guid: "2b6f4c1e-8a3d-4f5b-9c7e-1d2a3b4c5d6e".to_string(),
            trailing_byte: TrailingByte::Strip,
        }
    }

    #[test]
    fn valid_request_passes() {
        request().validate().unwrap();
    }

    #[test]
    fn no_inputs_rejected() {
        let mut req = request();
        req.inputs.clear();
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::Parameter);
    }

    #[test]
    fn long_path_rejected() {
        let mut req = request();
        req.master_license = PathBuf::from("x".repeat(MAX_FILE_NAME + 1));
        assert!(req.validate().is_err());
    }

    #[test]
    fn long_output_dir_does_not_count_against_path_bound() {
        let mut req = request();
        req.output_dir = Some(PathBuf::from(format!("/{}", "d".repeat(MAX_FILE_NAME))));
        req.validate().unwrap();
        assert!(req.protected_model_path().to_string_lossy().len() > MAX_FILE_NAME);
        assert!(req.master_license_path().ends_with("m.masterlic"));
    }

    #[test]
    fn absolute_outputs_ignore_output_dir() {
        let mut req = request();
        req.output_dir = Some(PathBuf::from("/out"));
        req.protected_model = PathBuf::from("/abs/m.dat");
        assert_eq!(req.protected_model_path(), PathBuf::from("/abs/m.dat"));
        assert_eq!(req.master_license_path(), PathBuf::from("/out/m.masterlic"));
    }

    #[test]
    fn long_guid_rejected() {
        let mut req = request();
        req.license_guid.push('0');
        assert!(req.validate().is_err());
    }

    #[test]
    fn stage_error_reports_stage_and_code() {
        let err = StageError {
            stage: Stage::MasterLicense,
            error: ProtectError::parameter("bad GUID"),
        };
        assert_eq!(err.code(), 1);
        assert!(format!("{err}").starts_with("create master license failed"));
    }
}
