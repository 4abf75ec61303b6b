//! # Software Keystore
//!
//! A JSON file holding one Ed25519 identity: the private seed in hex and
//! the self-issued certificate that binds its public key.
//!
//! ```json
//! {
//!   "name": "acme-isv",
//!   "algorithm": "ed25519",
//!   "seed": "<64 hex chars>",
//!   "certificate": "-----BEGIN MODELSEAL CERTIFICATE-----\n..."
//! }
//! ```
//!
//! ## Security Invariant
//!
//! The seed is held in a [`Zeroizing`] buffer and never appears in `Debug`
//! output. On Unix the file is created with mode `0600`.

use std::io::Write;
use std::path::Path;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use modelseal_core::{CryptoError, CryptoOperation, ProtectError};

use super::certificate::SelfCertificate;

/// The only algorithm the software backend understands.
pub const KEYSTORE_ALGORITHM: &str = "ed25519";

#[derive(Serialize, Deserialize)]
struct KeystoreFile {
    name: String,
    algorithm: String,
    seed: String,
    certificate: String,
}

impl Drop for KeystoreFile {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

/// An identity key and its certificate.
pub struct SoftwareKeystore {
    name: String,
    seed: Zeroizing<[u8; 32]>,
    certificate: String,
}

fn load_error(detail: impl Into<String>) -> CryptoError {
    CryptoError::failed(CryptoOperation::KeyLoad, detail)
}

impl SoftwareKeystore {
    /// Generate a fresh identity with a certificate valid for
    /// `validity_days`.
    pub fn generate(name: &str, validity_days: i64) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let certificate = SelfCertificate::issue(&signing_key, name, validity_days)?.to_pem()?;
        Ok(Self {
            name: name.to_string(),
            seed: Zeroizing::new(signing_key.to_bytes()),
            certificate,
        })
    }

    /// Read and validate a keystore file.
    ///
    /// The certificate must parse, carry a valid self-signature, and name
    /// the public key of the stored seed.
    pub fn load(path: &Path) -> Result<Self, CryptoError> {
        let raw = Zeroizing::new(
            std::fs::read(path)
                .map_err(|e| load_error(format!("cannot read {}: {e}", path.display())))?,
        );
        let file: KeystoreFile = serde_json::from_slice(&raw)
            .map_err(|e| load_error(format!("malformed keystore {}: {e}", path.display())))?;
        if file.algorithm != KEYSTORE_ALGORITHM {
            return Err(load_error(format!(
                "unsupported keystore algorithm {:?}",
                file.algorithm
            )));
        }

        let mut seed = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(file.seed.as_str(), seed.as_mut_slice())
            .map_err(|e| load_error(format!("keystore seed: {e}")))?;

        let keystore = Self {
            name: file.name.clone(),
            seed,
            certificate: file.certificate.clone(),
        };
        let cert = SelfCertificate::from_pem(&keystore.certificate)?;
        cert.verify_self_signature()?;
        if !cert.binds(&keystore.signing_key().verifying_key()) {
            return Err(load_error(
                "keystore certificate does not match the stored key",
            ));
        }
        Ok(keystore)
    }

    /// Write the keystore as JSON.
    pub fn save(&self, path: &Path) -> Result<(), ProtectError> {
        let file = KeystoreFile {
            name: self.name.clone(),
            algorithm: KEYSTORE_ALGORITHM.to_string(),
            seed: hex::encode(self.seed.as_slice()),
            certificate: self.certificate.clone(),
        };
        let json = Zeroizing::new(
            serde_json::to_vec_pretty(&file)
                .map_err(|e| ProtectError::Serialization(format!("keystore: {e}")))?,
        );

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut out = options
            .open(path)
            .map_err(|e| ProtectError::file_open(path, e))?;
        out.write_all(&json)
            .map_err(|e| ProtectError::file_open(path, e))?;
        tracing::info!(path = %path.display(), name = %self.name, "wrote keystore");
        Ok(())
    }

    /// Identity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// PEM-style certificate text.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// The signing key. Zeroized when the returned value is dropped.
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed)
    }
}

impl std::fmt::Debug for SoftwareKeystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareKeystore")
            .field("name", &self.name)
            .field("seed", &"<redacted>")
            .finish()
    }
}
