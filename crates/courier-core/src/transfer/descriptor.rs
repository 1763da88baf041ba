//! What to download and where.

use std::path::{Path, PathBuf};

/// One remote file and its local destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadDescriptor {
    pub download_url: String,
    /// Destination directory; empty means the current directory.
    pub local_path: PathBuf,
    pub local_file_name: String,
    /// Name of the file on the server, handed to the extractor.
    pub file_name: String,
    /// Path shown in progress output.
    pub relative_path: String,
    /// Lowercase hex SHA-1; empty disables verification.
    pub expected_sha1: String,
    pub size: Option<u64>,
    /// Extract the archive after download.
    pub explode: bool,
    pub skip_checksum: bool,
}

impl DownloadDescriptor {
    pub fn new(url: impl Into<String>, local_path: impl Into<PathBuf>, local_file_name: impl Into<String>) -> Self {
        let url = url.into();
        let local_file_name = local_file_name.into();
        Self {
            relative_path: url.clone(),
            file_name: local_file_name.clone(),
            download_url: url,
            local_path: local_path.into(),
            local_file_name,
            ..Self::default()
        }
    }

    pub fn expected_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.expected_sha1 = sha1.into().to_ascii_lowercase();
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn explode(mut self, explode: bool) -> Self {
        self.explode = explode;
        self
    }

    pub fn skip_checksum(mut self, skip: bool) -> Self {
        self.skip_checksum = skip;
        self
    }

    /// SHA-1 is checked only when one is expected and checking is not skipped.
    pub fn verifies_checksum(&self) -> bool {
        !self.expected_sha1.is_empty() && !self.skip_checksum
    }

    pub fn destination(&self) -> PathBuf {
        if self.local_path.as_os_str().is_empty() {
            PathBuf::from(&self.local_file_name)
        } else {
            self.local_path.join(&self.local_file_name)
        }
    }

    pub(crate) fn destination_dir(&self) -> &Path {
        &self.local_path
    }
}

/// A file downloaded as `split_count` concurrent range requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDownload {
    pub file: DownloadDescriptor,
    pub file_size: u64,
    pub split_count: usize,
}

impl ChunkedDownload {
    pub fn new(file: DownloadDescriptor, file_size: u64, split_count: usize) -> Self {
        Self {
            file,
            file_size,
            split_count,
        }
    }

    /// Never more chunks than bytes, never fewer than one.
    pub fn effective_split_count(&self) -> usize {
        let max = usize::try_from(self.file_size).unwrap_or(usize::MAX).max(1);
        self.split_count.clamp(1, max)
    }
}
