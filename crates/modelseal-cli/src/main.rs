//! # modelseal CLI entry point
//!
//! Parses command-line arguments, initialises tracing, loads the optional
//! configuration file, and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modelseal_cli::config::Settings;
use modelseal_cli::keystore::{run_keystore, KeystoreArgs};
use modelseal_cli::protect::{run_protect, ProtectArgs};

/// Protect model artifacts for licensed distribution.
///
/// Encrypts model files under a fresh content key, signs the resulting
/// protected model with the ISV identity key, and writes a master license
/// binding a license GUID to the model hash and the wrapped content key.
#[derive(Parser, Debug)]
#[command(name = "modelseal", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory that relative output paths are resolved against.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt model files into a protected model and a master license.
    Protect(ProtectArgs),

    /// Software keystore management.
    Keystore(KeystoreArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!("modelseal CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let result = match &cli.command {
        Commands::Protect(args) => run_protect(args, &settings),
        Commands::Keystore(args) => run_keystore(args, &settings),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// Configuration file settings with command-line overrides applied.
fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::load_optional(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        settings.output_dir = Some(dir.clone());
    }
    Ok(settings)
}
