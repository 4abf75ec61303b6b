//! Whole-file reads and writes with paths attached to failures.

use std::path::Path;

use modelseal_core::ProtectError;
use zeroize::Zeroizing;

/// Read a whole input file.
pub fn read_input(path: &Path) -> Result<Zeroizing<Vec<u8>>, ProtectError> {
    std::fs::read(path)
        .map(Zeroizing::new)
        .map_err(|e| ProtectError::file_open(path, e))
}

/// Create or truncate `path` and write `bytes` to it.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ProtectError> {
    std::fs::write(path, bytes).map_err(|e| ProtectError::file_open(path, e))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote output file");
    Ok(())
}
