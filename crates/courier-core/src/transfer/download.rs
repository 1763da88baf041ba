//! Single-stream file download.

use std::path::Path;

use anyhow::{Context, Result};

use super::extract::explode;
use super::DownloadDescriptor;
use crate::checksum::HashingWriter;
use crate::error::TransferError;
use crate::http::{is_retryable_error, ClientDetails, HttpClient, Method, Request, Response};
use crate::progress::{ProgressGuard, ProgressMgr, ProgressWriter};
use crate::retry::{should_retry, Attempt, AttemptOutcome};
use crate::storage::{create_file_path, PartFile};

impl HttpClient {
    /// Download `d` in one stream, following redirects.
    ///
    /// A status other than 200 comes back as `Ok(response)` with no file
    /// written. On 200 the file is renamed into place before the SHA-1 is
    /// compared, so a `ChecksumMismatch` leaves the bytes on disk.
    pub fn download_file(
        &self,
        d: &DownloadDescriptor,
        details: &ClientDetails,
        progress: Option<&dyn ProgressMgr>,
    ) -> Result<Response> {
        self.download(d, true, details, progress)
    }

    /// Like `download_file`, but a redirect is not followed: the response
    /// carries the target in `redirect_url` and nothing is written.
    pub fn download_file_no_redirect(
        &self,
        url: &str,
        local_path: &Path,
        file_name: &str,
        details: &ClientDetails,
    ) -> Result<Response> {
        let d = DownloadDescriptor::new(url, local_path, file_name);
        self.download(&d, false, details, None)
    }

    fn download(
        &self,
        d: &DownloadDescriptor,
        follow_redirect: bool,
        details: &ClientDetails,
        progress: Option<&dyn ProgressMgr>,
    ) -> Result<Response> {
        let mut outcome: Option<(Response, Option<String>)> = None;
        self.executor()
            .message(format!("Failure occurred while downloading {}", d.download_url))
            .execute(|| match self.download_once(d, follow_redirect, details, progress) {
                Err(e) if is_retryable_error(&e) => Attempt::Retry(Some(e)),
                Err(e) => Attempt::fail(e),
                Ok((resp, _)) if resp.status == 0 => Attempt::fail(TransferError::EmptyResponse.into()),
                Ok((resp, _)) if should_retry(AttemptOutcome::Status(resp.status)) => {
                    tracing::warn!("The server response: HTTP {}", resp.status);
                    Attempt::Retry(Some(
                        TransferError::UnexpectedStatus {
                            status: resp.status,
                            body: resp.body,
                        }
                        .into(),
                    ))
                }
                Ok(done) => {
                    outcome = Some(done);
                    Attempt::done()
                }
            })
            .with_context(|| format!("download {}", d.download_url))?;

        let (resp, digest) = outcome.ok_or(TransferError::EmptyResponse)?;
        if resp.status != 200 {
            return Ok(resp);
        }
        let dest = d.destination();
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
        tracing::info!("Downloaded {}", dest.display());
        Ok(resp)
    }

    /// One attempt: stream a 200 body into `<dest>.part`, then rename it into place.
    fn download_once(
        &self,
        d: &DownloadDescriptor,
        follow_redirect: bool,
        details: &ClientDetails,
        progress: Option<&dyn ProgressMgr>,
    ) -> Result<(Response, Option<String>)> {
        let req = Request::new(Method::Get, &d.download_url)
            .follow_redirect(follow_redirect)
            .expect_status(200);
        let dest = create_file_path(&d.local_path, &d.local_file_name)?;
        let part = PartFile::create(&dest)?;
        let guard = ProgressGuard::start(progress, d.size.unwrap_or(0), "Downloading", &d.relative_path);

        let mut sink = HashingWriter::new(
            ProgressWriter::new(part, guard.as_ref().map(|g| g.handle())),
            d.verifies_checksum(),
        );
        let result = self.perform(&req, details, &mut sink, None, self.cancel_flag());
        let (progress_writer, digest) = sink.finish();
        let part = progress_writer.into_inner();
        let resp = match result {
            Ok(resp) if resp.status == 200 => resp,
            Ok(resp) => {
                part.discard();
                return Ok((resp, None));
            }
            Err(e) => {
                part.discard();
                return Err(e.into_anyhow());
            }
        };
        part.commit()?;
        Ok((resp, digest))
    }
}
