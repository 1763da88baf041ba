//! One chunk worker: a retried range GET into a private temp file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::TransferError;
use crate::http::{is_retryable_error, ClientDetails, HttpClient, Method, Request, Response};
use crate::progress::{ProgressHandle, ProgressWriter};
use crate::retry::{should_retry, Attempt, AttemptOutcome};
use crate::segmenter::Chunk;

/// Download `chunk` of `url` into `path`.
///
/// Returns the final response: 206 on success, or whatever non-retryable
/// status the server answered with. Transport failures, 5xx and 429 are retried.
pub(super) fn download_chunk(
    client: &HttpClient,
    url: &str,
    chunk: &Chunk,
    path: &Path,
    details: &ClientDetails,
    progress: Option<ProgressHandle<'_>>,
) -> Result<Response> {
    let req = Request::new(Method::Get, url)
        .header("Range", chunk.range_header_value())
        .expect_status(206);
    let mut response = None;
    // Bytes the previous attempt reported; its chunk file is truncated on retry.
    let mut reported = 0u64;
    client
        .executor()
        .label(format!("[{}]: ", chunk.index))
        .message(format!(
            "Failure occurred while downloading part {} of {}",
            chunk.index, url
        ))
        .execute(|| {
            if let Some(h) = progress {
                h.rewind(std::mem::take(&mut reported));
            }
            match fetch_range(client, &req, path, details, progress, &mut reported) {
                Err(e) if is_retryable_error(&e) => Attempt::Retry(Some(e)),
                Err(e) => Attempt::fail(e),
                Ok(resp) if resp.status == 0 => Attempt::fail(TransferError::EmptyResponse.into()),
                Ok(resp) if should_retry(AttemptOutcome::Status(resp.status)) => {
                    tracing::warn!("[{}]: The server response: HTTP {}", chunk.index, resp.status);
                    Attempt::Retry(Some(
                        TransferError::UnexpectedStatus {
                            status: resp.status,
                            body: resp.body,
                        }
                        .into(),
                    ))
                }
                Ok(resp) => {
                    if resp.status == 206 {
                        tracing::info!("[{}]: HTTP 206 Partial Content...", chunk.index);
                    }
                    response = Some(resp);
                    Attempt::done()
                }
            }
        })?;
    response.ok_or_else(|| TransferError::EmptyResponse.into())
}

fn fetch_range(
    client: &HttpClient,
    req: &Request,
    path: &Path,
    details: &ClientDetails,
    progress: Option<ProgressHandle<'_>>,
    reported: &mut u64,
) -> Result<Response> {
    let file = File::create(path).with_context(|| format!("create chunk file {}", path.display()))?;
    let mut sink = ProgressWriter::new(BufWriter::new(file), progress);
    let res = client.perform(req, details, &mut sink, None, client.cancel_flag());
    *reported = sink.reported();
    let resp = res.map_err(|e| e.into_anyhow())?;
    sink.flush()
        .with_context(|| format!("write chunk file {}", path.display()))?;
    Ok(resp)
}
