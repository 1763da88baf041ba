//! Fan chunk workers out on scoped threads and collect their reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::chunk::download_chunk;
use crate::error::TransferError;
use crate::http::{ClientDetails, HttpClient, Response};
use crate::progress::ProgressHandle;
use crate::segmenter::ChunkPlan;

/// How often the coordinator checks the client's abort token while waiting.
const ABORT_POLL: Duration = Duration::from_millis(100);

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<TransferError>(), Some(TransferError::Cancelled))
}

/// Download every chunk of `plan` concurrently, one thread per chunk.
///
/// The first error or non-206 response cancels the remaining workers. Errors
/// win over unexpected responses; with neither, the last chunk's 206 response
/// is returned. All workers are joined before this returns.
pub(super) fn run_chunks(
    client: &HttpClient,
    url: &str,
    plan: &ChunkPlan,
    details: &ClientDetails,
    progress: Option<ProgressHandle<'_>>,
) -> Result<Response> {
    let count = plan.split_count();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_client = client.with_abort_token(Arc::clone(&cancel));
    let (tx, rx) = mpsc::channel::<(usize, Result<Response>)>();

    thread::scope(|s| {
        let mut handles = Vec::with_capacity(count);
        for (chunk, path) in plan.chunks.iter().zip(&plan.temp_paths) {
            let tx = tx.clone();
            let worker_client = &worker_client;
            // Every worker signs its request with its own copy of the details.
            let details = details.clone();
            handles.push(s.spawn(move || {
                let res = download_chunk(worker_client, url, chunk, path, &details, progress);
                let _ = tx.send((chunk.index, res));
            }));
        }
        drop(tx);

        let mut responses: Vec<Option<Response>> = (0..count).map(|_| None).collect();
        let mut first_error: Option<anyhow::Error> = None;
        let mut unexpected: Option<Response> = None;
        let mut aborted = false;
        let mut pending = count;
        while pending > 0 {
            let (index, res) = match rx.recv_timeout(ABORT_POLL) {
                Ok(pair) => pair,
                Err(RecvTimeoutError::Timeout) => {
                    if client.is_aborted() {
                        aborted = true;
                        cancel.store(true, Ordering::Relaxed);
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    first_error.get_or_insert_with(|| {
                        anyhow!("chunk result channel closed (worker may have panicked)")
                    });
                    break;
                }
            };
            pending -= 1;
            match res {
                Ok(resp) if resp.status == 206 => responses[index] = Some(resp),
                Ok(resp) => {
                    tracing::warn!("[{}]: unexpected HTTP {} for chunk, aborting download", index, resp.status);
                    cancel.store(true, Ordering::Relaxed);
                    unexpected.get_or_insert(resp);
                }
                Err(e) if is_cancelled(&e) => cancel.store(true, Ordering::Relaxed),
                Err(e) => {
                    cancel.store(true, Ordering::Relaxed);
                    first_error.get_or_insert_with(|| e.context(format!("chunk {} of {}", index, url)));
                }
            }
        }

        for h in handles {
            if h.join().is_err() {
                first_error.get_or_insert_with(|| anyhow!("chunk worker panicked"));
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if let Some(resp) = unexpected {
            return Ok(resp);
        }
        if aborted || client.is_aborted() {
            return Err(TransferError::Cancelled.into());
        }
        responses
            .pop()
            .flatten()
            .ok_or_else(|| anyhow!("no response for the last chunk of {}", url))
    })
}
