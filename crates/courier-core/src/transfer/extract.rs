//! Archive extraction hook for "explode" downloads.

use std::path::Path;

use anyhow::{Context, Result};

use super::DownloadDescriptor;
use crate::error::TransferError;
use crate::http::HttpClient;

/// Unpacks a downloaded archive. Archive formats live outside this crate;
/// install an implementation with `HttpClientBuilder::extractor`.
pub trait Extractor: Send + Sync {
    /// Extract `archive` into `dest_dir`. `file_name` is the name of the file
    /// on the server, which may carry the extension the local name lacks.
    fn extract(&self, archive: &Path, dest_dir: &Path, file_name: &str) -> Result<()>;
}

pub(crate) fn explode(client: &HttpClient, archive: &Path, d: &DownloadDescriptor) -> Result<()> {
    let extractor = client.extractor().ok_or(TransferError::ExtractorMissing)?;
    tracing::debug!("extracting {}", archive.display());
    extractor
        .extract(archive, d.destination_dir(), &d.file_name)
        .with_context(|| format!("extract {}", archive.display()))
}
