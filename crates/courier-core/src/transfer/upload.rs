//! File upload with checksum headers.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

use crate::checksum;
use crate::error::TransferError;
use crate::http::{is_retryable_error, ClientDetails, HttpClient, Method, Request, Response, Upload};
use crate::progress::{ProgressGuard, ProgressMgr, ProgressReader};
use crate::retry::{should_retry, Attempt, AttemptOutcome};

/// Statuses an upload treats as success.
const UPLOAD_OK: [u32; 3] = [200, 201, 202];

fn check_upload_status(resp: Response) -> Result<Response> {
    if UPLOAD_OK.contains(&resp.status) {
        return Ok(resp);
    }
    Err(TransferError::UnexpectedStatus {
        status: resp.status,
        body: resp.body,
    }
    .into())
}

impl HttpClient {
    /// PUT a local file to `url` with its SHA-1, MD5 and SHA-256 as
    /// `X-Checksum-*` headers. Retried on transport failures, 5xx and 429;
    /// each attempt re-reads the file from the start.
    pub fn upload_file(
        &self,
        local_path: &Path,
        url: &str,
        details: &ClientDetails,
        progress: Option<&dyn ProgressMgr>,
    ) -> Result<Response> {
        let sums = checksum::calc_path(local_path)?;
        let size = std::fs::metadata(local_path)
            .with_context(|| format!("stat {}", local_path.display()))?
            .len();
        let req = Request::new(Method::Put, url)
            .header("X-Checksum-Sha1", sums.sha1)
            .header("X-Checksum-Md5", sums.md5)
            .header("X-Checksum-Sha256", sums.sha256);

        let mut response = None;
        self.executor()
            .message(format!("Failure occurred while uploading to {}", url))
            .execute(|| {
                let file = match File::open(local_path) {
                    Ok(f) => f,
                    Err(e) => {
                        return Attempt::fail(
                            anyhow::Error::new(e).context(format!("open {}", local_path.display())),
                        )
                    }
                };
                let guard = ProgressGuard::start(progress, size, "Uploading", url);
                let mut reader =
                    ProgressReader::new(BufReader::new(file), guard.as_ref().map(|g| g.handle()));
                match self.upload_once(&req, details, &mut reader, size) {
                    Err(e) if is_retryable_error(&e) => Attempt::Retry(Some(e)),
                    Err(e) => Attempt::fail(e),
                    Ok(resp) if resp.status == 0 => Attempt::fail(TransferError::EmptyResponse.into()),
                    Ok(resp) if should_retry(AttemptOutcome::Status(resp.status)) => {
                        tracing::warn!("The server response: HTTP {}\n{}", resp.status, resp.body_text());
                        Attempt::Retry(Some(
                            TransferError::UnexpectedStatus {
                                status: resp.status,
                                body: resp.body,
                            }
                            .into(),
                        ))
                    }
                    Ok(resp) => {
                        response = Some(resp);
                        Attempt::done()
                    }
                }
            })
            .with_context(|| format!("upload {} to {}", local_path.display(), url))?;
        let resp = response.ok_or(TransferError::EmptyResponse)?;
        check_upload_status(resp).with_context(|| format!("upload {} to {}", local_path.display(), url))
    }

    /// PUT `size` bytes from `reader` to `url`. A reader cannot be rewound,
    /// so this makes a single attempt.
    pub fn upload_file_from_reader(
        &self,
        reader: &mut dyn Read,
        url: &str,
        details: &ClientDetails,
        size: u64,
    ) -> Result<Response> {
        let req = Request::new(Method::Put, url);
        let resp = self
            .upload_once(&req, details, reader, size)
            .with_context(|| format!("upload to {}", url))?;
        if resp.status == 0 {
            return Err(TransferError::EmptyResponse.into());
        }
        check_upload_status(resp).with_context(|| format!("upload to {}", url))
    }

    fn upload_once(
        &self,
        req: &Request,
        details: &ClientDetails,
        reader: &mut dyn Read,
        size: u64,
    ) -> Result<Response> {
        let mut body = Vec::new();
        let mut resp = self
            .perform(req, details, &mut body, Some(Upload { reader, size }), self.cancel_flag())
            .map_err(|e| e.into_anyhow())?;
        resp.body = body;
        Ok(resp)
    }
}
