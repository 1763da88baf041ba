//! Probe, skip-if-unchanged, then single-stream or chunked download.

use std::path::Path;

use anyhow::Result;

use super::{ChunkedDownload, DownloadDescriptor};
use crate::checksum::local_matches_sha1;
use crate::config::CourierConfig;
use crate::http::{ClientDetails, HttpClient, Response};
use crate::progress::ProgressMgr;

/// How a coordinated download ended.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Local file already matches the remote SHA-1; nothing was transferred.
    Skipped,
    Downloaded(Response),
    /// Probe or transfer got a status it cannot use (e.g. 404, expired link).
    Unexpected(Response),
}

/// A download must happen unless the local file's SHA-1 equals the remote one.
/// No remote SHA-1 always means download.
pub fn should_download_file(local_path: &Path, remote_sha1: &str) -> Result<bool> {
    Ok(!local_matches_sha1(local_path, remote_sha1)?)
}

/// Picks the transfer strategy for one file.
pub struct Downloader<'a> {
    client: &'a HttpClient,
    split_count: usize,
    min_split_size: u64,
    progress: Option<&'a dyn ProgressMgr>,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a HttpClient) -> Self {
        let cfg = CourierConfig::default();
        Self {
            client,
            split_count: cfg.split_count,
            min_split_size: cfg.min_split_size,
            progress: None,
        }
    }

    pub fn from_config(client: &'a HttpClient, cfg: &CourierConfig) -> Self {
        Self::new(client)
            .split_count(cfg.split_count)
            .min_split_size(cfg.min_split_size)
    }

    pub fn split_count(mut self, split_count: usize) -> Self {
        self.split_count = split_count;
        self
    }

    pub fn min_split_size(mut self, min_split_size: u64) -> Self {
        self.min_split_size = min_split_size;
        self
    }

    pub fn progress(mut self, progress: Option<&'a dyn ProgressMgr>) -> Self {
        self.progress = progress;
        self
    }

    pub fn download(&self, mut d: DownloadDescriptor, details: &ClientDetails) -> Result<DownloadOutcome> {
        let (remote, head) = self.client.get_remote_file_details(&d.download_url, details)?;
        let Some(remote) = remote else {
            tracing::debug!("HEAD {} returned HTTP {}", d.download_url, head.status);
            return Ok(DownloadOutcome::Unexpected(head));
        };

        let dest = d.destination();
        if !should_download_file(&dest, &remote.checksums.sha1)? {
            tracing::info!("File already exists locally: {}", dest.display());
            return Ok(DownloadOutcome::Skipped);
        }
        if d.expected_sha1.is_empty() {
            d.expected_sha1 = remote.checksums.sha1.clone();
        }
        d.size = Some(remote.size);

        let chunked = remote.accept_ranges && remote.size >= self.min_split_size && remote.size > 0 && self.split_count > 1;
        let resp = if chunked {
            tracing::debug!("downloading {} in {} chunks", d.download_url, self.split_count);
            let flags = ChunkedDownload::new(d, remote.size, self.split_count);
            self.client.download_file_concurrently(&flags, details, self.progress)?
        } else {
            self.client.download_file(&d, details, self.progress)?
        };
        Ok(match resp.status {
            200 | 206 => DownloadOutcome::Downloaded(resp),
            _ => DownloadOutcome::Unexpected(resp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_remote_checksum_means_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello\n").unwrap();
        assert!(should_download_file(&path, "").unwrap());
        assert!(!should_download_file(&path, "f572d396fae9206628714fb2ce00f72e94f2258f").unwrap());
        assert!(should_download_file(&dir.path().join("missing"), "f572d396fae9206628714fb2ce00f72e94f2258f").unwrap());
    }

    #[test]
    fn builder_defaults_from_config() {
        let client = HttpClient::builder().build().unwrap();
        let cfg = CourierConfig {
            split_count: 6,
            min_split_size: 1,
            ..CourierConfig::default()
        };
        let d = Downloader::from_config(&client, &cfg);
        assert_eq!(d.split_count, 6);
        assert_eq!(d.min_split_size, 1);
    }
}
