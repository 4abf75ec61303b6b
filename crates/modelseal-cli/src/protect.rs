//! # Protect CLI
//!
//! `modelseal protect` maps command-line flags (and configuration
//! fallbacks) onto a [`ProtectRequest`] and runs it against the software
//! crypto service. Protocol failures are reported with their stage and
//! error code and turn into exit status 1.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use modelseal_core::ModelMetadata;
use modelseal_crypto::SoftwareCryptoService;
use modelseal_protect::{protect, ProtectOutcome, ProtectRequest, TrailingByte};

use crate::config::Settings;

/// Protect subcommand arguments.
#[derive(Args, Debug)]
pub struct ProtectArgs {
    /// Model artifact files, in order.
    #[arg(short, long = "input", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    /// Model name.
    #[arg(short, long)]
    pub name: String,

    /// Model description.
    #[arg(short, long)]
    pub description: String,

    /// Model version.
    #[arg(long = "model-version")]
    pub model_version: String,

    /// Output path of the signed protected model.
    #[arg(short, long)]
    pub protected_model: PathBuf,

    /// Output path of the authenticated master license.
    #[arg(short, long)]
    pub master_license: PathBuf,

    /// Keystore holding the identity key. Falls back to the config file.
    #[arg(short, long)]
    pub keystore: Option<PathBuf>,

    /// License GUID bound into the master license.
    #[arg(short = 'g', long)]
    pub license_guid: String,

    /// Encrypt every input byte instead of dropping the final terminator.
    #[arg(long)]
    pub keep_trailing_byte: bool,

    /// Unrecognised trailing arguments; logged and ignored.
    #[arg(hide = true)]
    pub extra: Vec<String>,
}

impl ProtectArgs {
    /// Build the request, applying configuration fallbacks.
    pub fn to_request(&self, settings: &Settings) -> Result<ProtectRequest> {
        let keystore = match (&self.keystore, &settings.keystore) {
            (Some(path), _) | (None, Some(path)) => path.clone(),
            (None, None) => {
                bail!("no keystore given: pass --keystore or set `keystore` in the config file")
            }
        };
        let trailing_byte = if self.keep_trailing_byte {
            TrailingByte::Keep
        } else {
            settings.trailing_byte
        };
        Ok(ProtectRequest {
            inputs: self.inputs.clone(),
            metadata: ModelMetadata::new(&self.name, &self.description, &self.model_version),
            keystore,
            protected_model: self.protected_model.clone(),
            master_license: self.master_license.clone(),
            output_dir: settings.output_dir.clone(),
            license_guid: self.license_guid.clone(),
            trailing_byte,
        })
    }
}

/// Execute the protect subcommand.
pub fn run_protect(args: &ProtectArgs, settings: &Settings) -> Result<u8> {
    for extra in &args.extra {
        tracing::warn!(argument = %extra, "ignoring extra argument");
    }
    let request = args.to_request(settings)?;
    let service = SoftwareCryptoService::new();

    match protect(&service, &request) {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(0)
        }
        Err(e) => {
            eprintln!(
                "error: {} failed (code {}): {}",
                e.stage,
                e.code(),
                e.error
            );
            Ok(1)
        }
    }
}

fn print_outcome(outcome: &ProtectOutcome) {
    println!("Protected {} model file(s)", outcome.artifact_count);
    println!("  model GUID:      {}", outcome.model_guid);
    println!("  model hash:      {}", outcome.model_hash);
    println!("  license GUID:    {}", outcome.license_guid);
    println!("  protected model: {}", outcome.protected_model.display());
    println!("  master license:  {}", outcome.master_license.display());
}
