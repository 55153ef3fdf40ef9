//! YAML rendering and atomic writing of the harvested document.

use crate::model::HarvestDocument;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Writer task failed: {0}")]
    Task(String),
}

pub fn render_document(document: &HarvestDocument) -> Result<String, OutputError> {
    Ok(serde_yaml_ng::to_string(document)?)
}

/// Replaces `path` with `contents` via a temp file in the same directory, so
/// readers never observe a partially written document.
///
/// # Errors
///
/// Returns [`OutputError::Io`] if the temp file cannot be created, written or
/// renamed over `path`. The destination is left untouched in that case.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), OutputError> {
    let io_error = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(contents.as_bytes()).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    file.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

/// Renders `document` and writes it atomically to `path`.
///
/// # Errors
///
/// Returns [`OutputError`] on serialization or I/O failure.
pub fn write_document(path: &Path, document: &HarvestDocument) -> Result<(), OutputError> {
    let rendered = render_document(document)?;
    write_atomic(path, &rendered)
}
