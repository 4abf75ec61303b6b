//! # Input File List
//!
//! The ordered set of model artifact files submitted for protection.
//! Order is preserved end to end: artifact `i` of the protected model
//! document is always the `i`-th path the caller supplied.

use std::path::{Path, PathBuf};

use modelseal_core::{truncate_bounded, MAX_FILE_NAME};

/// One submitted file and its position in the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Path as supplied by the caller.
    pub path: PathBuf,
    /// Zero-based submission position.
    pub ordinal: usize,
}

impl InputFile {
    /// Name recorded in the document for this file.
    ///
    /// The text after the last `/`, bounded to [`MAX_FILE_NAME`] bytes.
    pub fn artifact_name(&self) -> String {
        artifact_name(&self.path)
    }
}

/// Ordered, indexable list of input files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputFiles {
    files: Vec<InputFile>,
}

impl InputFiles {
    /// Number the paths in submission order.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let files = paths
            .into_iter()
            .enumerate()
            .map(|(ordinal, path)| InputFile {
                path: path.into(),
                ordinal,
            })
            .collect();
        Self { files }
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no files were submitted.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, InputFile> {
        self.files.iter()
    }

    /// The files as a slice.
    pub fn as_slice(&self) -> &[InputFile] {
        &self.files
    }
}

impl<'a> IntoIterator for &'a InputFiles {
    type Item = &'a InputFile;
    type IntoIter = std::slice::Iter<'a, InputFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Base name of `path` as recorded in documents.
pub fn artifact_name(path: &Path) -> String {
    let text = path.to_string_lossy();
    let base = text.rsplit('/').next().unwrap_or_default();
    truncate_bounded(base, MAX_FILE_NAME).to_string()
}
