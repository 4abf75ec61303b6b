//! # Configuration File
//!
//! Optional YAML settings loaded with `--config`. Every field has a
//! command-line counterpart that takes precedence.
//!
//! ```yaml
//! keystore: /etc/modelseal/isv.json
//! output_dir: /srv/models/protected
//! trailing_byte: keep
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use modelseal_protect::TrailingByte;

/// Settings read from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Default keystore when `--keystore` is not given.
    pub keystore: Option<PathBuf>,
    /// Directory that relative output paths are resolved against.
    pub output_dir: Option<PathBuf>,
    /// Plaintext terminator policy.
    pub trailing_byte: TrailingByte,
}

impl Settings {
    /// Read settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Read settings if a path was given, otherwise use defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let settings = Self::load(p)?;
                tracing::debug!(path = %p.display(), "loaded configuration");
                Ok(settings)
            }
            None => Ok(Self::default()),
        }
    }

    /// Resolve an output path against `output_dir`.
    ///
    /// Absolute paths, and every path when no output directory is set,
    /// are returned unchanged.
    pub fn resolve_output(&self, path: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}
