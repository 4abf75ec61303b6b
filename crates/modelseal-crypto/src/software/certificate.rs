//! # Self-Issued Identity Certificates
//!
//! The software backend binds an Ed25519 public key to a subject name with
//! a self-signed certificate. The certificate travels as PEM-style text so
//! it can be embedded verbatim in protected-model and master-license
//! documents:
//!
//! ```text
//! -----BEGIN MODELSEAL CERTIFICATE-----
//! <base64 of the signed JSON body, 64 columns>
//! -----END MODELSEAL CERTIFICATE-----
//! ```
//!
//! The signature covers the compact JSON serialization of the body
//! (subject, public key, validity window) in field declaration order.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use modelseal_core::{CryptoError, CryptoOperation};

const PEM_BEGIN: &str = "-----BEGIN MODELSEAL CERTIFICATE-----";
const PEM_END: &str = "-----END MODELSEAL CERTIFICATE-----";
const PEM_COLUMNS: usize = 64;

/// The signed portion of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CertificateBody {
    subject: String,
    public_key: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignedCertificate {
    body: CertificateBody,
    signature: String,
}

/// A parsed self-issued certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfCertificate {
    body: CertificateBody,
    signature: [u8; 64],
}

fn verification_error(detail: impl Into<String>) -> CryptoError {
    CryptoError::failed(CryptoOperation::CertificateVerification, detail)
}

impl SelfCertificate {
    /// Issue a certificate for `signing_key` valid from now for
    /// `validity_days`.
    pub fn issue(
        signing_key: &SigningKey,
        subject: &str,
        validity_days: i64,
    ) -> Result<Self, CryptoError> {
        if validity_days <= 0 {
            return Err(CryptoError::failed(
                CryptoOperation::KeyGeneration,
                format!("certificate validity must be positive, got {validity_days} days"),
            ));
        }
        let not_before = Utc::now();
        let not_after = Duration::try_days(validity_days)
            .and_then(|validity| not_before.checked_add_signed(validity))
            .ok_or_else(|| {
                CryptoError::failed(
                    CryptoOperation::KeyGeneration,
                    format!("certificate validity of {validity_days} days is out of range"),
                )
            })?;
        Self::issue_window(signing_key, subject, not_before, not_after)
    }

    /// Issue a certificate with an explicit validity window.
    pub fn issue_window(
        signing_key: &SigningKey,
        subject: &str,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Self, CryptoError> {
        let body = CertificateBody {
            subject: subject.to_string(),
            public_key: hex::encode(signing_key.verifying_key().as_bytes()),
            not_before,
            not_after,
        };
        let tbs = serde_json::to_vec(&body).map_err(|e| {
            CryptoError::failed(CryptoOperation::KeyGeneration, format!("certificate body: {e}"))
        })?;
        let signature = signing_key.sign(&tbs).to_bytes();
        Ok(Self { body, signature })
    }

    /// Parse PEM-style certificate text. Does not verify it.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let inner = pem
            .trim()
            .strip_prefix(PEM_BEGIN)
            .and_then(|rest| rest.strip_suffix(PEM_END))
            .ok_or_else(|| verification_error("certificate armour missing"))?;
        let encoded: String = inner.split_whitespace().collect();
        let decoded = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| verification_error(format!("certificate base64: {e}")))?;
        let signed: SignedCertificate = serde_json::from_slice(&decoded)
            .map_err(|e| verification_error(format!("certificate body: {e}")))?;

        let sig_bytes = hex::decode(&signed.signature)
            .map_err(|e| verification_error(format!("certificate signature hex: {e}")))?;
        let signature: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| verification_error("certificate signature must be 64 bytes"))?;
        Ok(Self {
            body: signed.body,
            signature,
        })
    }

    /// Render as PEM-style text.
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        let signed = SignedCertificate {
            body: self.body.clone(),
            signature: hex::encode(self.signature),
        };
        let json = serde_json::to_vec(&signed).map_err(|e| {
            CryptoError::failed(CryptoOperation::CertificateRetrieval, e.to_string())
        })?;
        let encoded = STANDARD.encode(json);

        let mut pem = String::with_capacity(encoded.len() + encoded.len() / PEM_COLUMNS + 80);
        pem.push_str(PEM_BEGIN);
        pem.push('\n');
        // base64 output is ASCII, so byte chunks are valid str slices.
        for chunk in encoded.as_bytes().chunks(PEM_COLUMNS) {
            pem.push_str(std::str::from_utf8(chunk).unwrap_or_default());
            pem.push('\n');
        }
        pem.push_str(PEM_END);
        pem.push('\n');
        Ok(pem)
    }

    /// Subject name.
    pub fn subject(&self) -> &str {
        &self.body.subject
    }

    /// Start of the validity window.
    pub fn not_before(&self) -> DateTime<Utc> {
        self.body.not_before
    }

    /// End of the validity window.
    pub fn not_after(&self) -> DateTime<Utc> {
        self.body.not_after
    }

    /// The certified public key.
    pub fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = hex::decode(&self.body.public_key)
            .map_err(|e| verification_error(format!("public key hex: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| verification_error("public key must be 32 bytes"))?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| verification_error(format!("invalid public key: {e}")))
    }

    /// Check the self-signature.
    pub fn verify_self_signature(&self) -> Result<(), CryptoError> {
        let tbs = serde_json::to_vec(&self.body)
            .map_err(|e| verification_error(format!("certificate body: {e}")))?;
        let signature = Signature::from_bytes(&self.signature);
        self.verifying_key()?
            .verify_strict(&tbs, &signature)
            .map_err(|_| verification_error("certificate self-signature does not verify"))
    }

    /// Check that `at` falls inside the validity window.
    pub fn check_lifetime(&self, at: DateTime<Utc>) -> Result<(), CryptoError> {
        if at < self.body.not_before {
            return Err(verification_error(format!(
                "certificate not valid before {}",
                self.body.not_before
            )));
        }
        if at > self.body.not_after {
            return Err(verification_error(format!(
                "certificate expired at {}",
                self.body.not_after
            )));
        }
        Ok(())
    }

    /// Whether this certificate names `key`.
    pub fn binds(&self, key: &VerifyingKey) -> bool {
        self.body.public_key == hex::encode(key.as_bytes())
    }
}
