//! Concurrent chunked downloader.
//!
//! Splits a file into `split_count` byte ranges, downloads each on its own
//! thread into a private temp file, and merges the files in chunk order once
//! every range came back as 206. Any failure cancels the other workers and
//! skips the merge; the temp directory is always removed.

mod chunk;
mod merge;
mod run;

use anyhow::{bail, Context, Result};

use crate::error::TransferError;
use crate::http::{ClientDetails, HttpClient, Response};
use crate::progress::{ProgressGuard, ProgressMgr};
use crate::segmenter::plan_chunks;
use crate::storage::create_file_path;
use crate::transfer::{explode, ChunkedDownload};

impl HttpClient {
    /// Download `flags.file` as concurrent range requests.
    ///
    /// Returns the last chunk's 206 response on success. If any chunk got a
    /// non-206, non-retryable status, that response is returned instead and
    /// nothing is merged; the caller branches on `status`.
    pub fn download_file_concurrently(
        &self,
        flags: &ChunkedDownload,
        details: &ClientDetails,
        progress: Option<&dyn ProgressMgr>,
    ) -> Result<Response> {
        let d = &flags.file;
        if flags.file_size == 0 {
            bail!("cannot download {} in chunks: file is empty", d.download_url);
        }
        let temp_dir = tempfile::Builder::new()
            .prefix("courier-chunks-")
            .tempdir()
            .context("create chunk directory")?;
        let mut plan = plan_chunks(flags.file_size, flags.effective_split_count());
        plan.assign_temp_paths(temp_dir.path());

        let guard = ProgressGuard::start(progress, flags.file_size, "Downloading", &d.relative_path);
        let resp = run::run_chunks(
            self,
            &d.download_url,
            &plan,
            details,
            guard.as_ref().map(|g| g.handle()),
        )?;
        if resp.status != 206 {
            return Ok(resp);
        }

        let dest = create_file_path(&d.local_path, &d.local_file_name)?;
        if let Some(g) = &guard {
            g.set_state("Merging");
        }
        let digest = merge::merge_chunks(&plan.temp_paths, &dest, flags.file_size, d.verifies_checksum())?;
        if let Some(actual) = digest {
            if actual != d.expected_sha1 {
                return Err(TransferError::ChecksumMismatch {
                    path: dest,
                    expected: d.expected_sha1.clone(),
                    actual,
                }
                .into());
            }
        }
        if d.explode {
            explode(self, &dest, d)?;
        }
        temp_dir.close().context("remove chunk directory")?;
        tracing::info!("Done downloading {}", dest.display());
        Ok(resp)
    }
}
