//! Reading editor documents straight from disk.

use std::path::PathBuf;

use tower_lsp::lsp_types::Url;

use crate::error::{Error, Result};

/// Map a `file://` URI to a local path, percent-decoding it.
pub fn document_path(uri: &Url) -> Result<PathBuf> {
    if uri.scheme() != "file" {
        return Err(Error::InvalidDocumentUri(uri.to_string()));
    }
    uri.to_file_path()
        .map_err(|_| Error::InvalidDocumentUri(uri.to_string()))
}

/// Read a document and split it on `\n`.
///
/// Every call goes back to disk; unsaved editor buffers are not seen.
/// Invalid UTF-8 is replaced with U+FFFD rather than failing the read.
pub fn read_lines(uri: &Url) -> Result<Vec<String>> {
    let path = document_path(uri)?;
    let bytes = std::fs::read(&path).map_err(|source| Error::ReadDocument { path, source })?;
    Ok(String::from_utf8_lossy(&bytes)
        .split('\n')
        .map(str::to_string)
        .collect())
}
