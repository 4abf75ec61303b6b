//! # Keystore CLI
//!
//! `modelseal keystore generate` creates a software keystore: a fresh
//! Ed25519 identity key and a self-issued certificate for it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use modelseal_crypto::SoftwareKeystore;

use crate::config::Settings;

/// Keystore subcommand arguments.
#[derive(Args, Debug)]
pub struct KeystoreArgs {
    #[command(subcommand)]
    pub command: KeystoreCommand,
}

/// Available keystore subcommands.
#[derive(Subcommand, Debug)]
pub enum KeystoreCommand {
    /// Generate a new identity key and self-issued certificate.
    Generate {
        /// Certificate subject.
        #[arg(long)]
        subject: String,

        /// Certificate validity in days.
        #[arg(long, default_value_t = 365)]
        days: i64,

        /// Output keystore path.
        #[arg(long)]
        out: PathBuf,

        /// Overwrite an existing keystore.
        #[arg(long)]
        force: bool,
    },
}

/// Execute the keystore subcommand.
pub fn run_keystore(args: &KeystoreArgs, settings: &Settings) -> Result<u8> {
    match &args.command {
        KeystoreCommand::Generate {
            subject,
            days,
            out,
            force,
        } => {
            let out = settings.resolve_output(out);
            if out.exists() && !force {
                bail!(
                    "keystore already exists: {} (use --force to overwrite)",
                    out.display()
                );
            }
            let keystore = SoftwareKeystore::generate(subject, *days)
                .context("failed to generate identity key")?;
            keystore
                .save(&out)
                .with_context(|| format!("failed to write keystore: {}", out.display()))?;
            tracing::info!(path = %out.display(), subject = %subject, "keystore generated");
            println!("Keystore written to {}", out.display());
            println!("  subject:  {subject}");
            println!("  validity: {days} day(s)");
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(out: PathBuf, force: bool) -> KeystoreArgs {
        KeystoreArgs {
            command: KeystoreCommand::Generate {
                subject: "acme".to_string(),
                days: 30,
                out,
                force,
            },
        }
    }

    #[test]
    fn generates_loadable_keystore() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("isv.json");
        assert_eq!(run_keystore(&generate(out.clone(), false), &Settings::default()).unwrap(), 0);
        let loaded = SoftwareKeystore::load(&out).unwrap();
        assert_eq!(loaded.name(), "acme");
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("isv.json");
        std::fs::write(&out, b"{}").unwrap();
        assert!(run_keystore(&generate(out.clone(), false), &Settings::default()).is_err());
        assert_eq!(std::fs::read(&out).unwrap(), b"{}");

        assert_eq!(run_keystore(&generate(out.clone(), true), &Settings::default()).unwrap(), 0);
        SoftwareKeystore::load(&out).unwrap();
    }

    #[test]
    fn rejects_non_positive_validity() {
        let dir = tempfile::tempdir().unwrap();
        let args = KeystoreArgs {
            command: KeystoreCommand::Generate {
                subject: "acme".to_string(),
                days: 0,
                out: dir.path().join("isv.json"),
                force: false,
            },
        };
        assert!(run_keystore(&args, &Settings::default()).is_err());
        assert!(!dir.path().join("isv.json").exists());
    }
}
