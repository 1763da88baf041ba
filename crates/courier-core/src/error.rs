//! Error kinds callers branch on.
//!
//! Everything else travels as `anyhow::Error` with context; these are the
//! conditions worth a `downcast_ref::<TransferError>()`.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Computed digest of written bytes differs from the expected one.
    /// The bytes are already on disk at `path`; the caller decides what to do with them.
    #[error("checksum mismatch for {}, expected: {expected}, actual: {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Server answered with a status the operation does not accept.
    #[error("server response: HTTP {status}\n{}", String::from_utf8_lossy(body))]
    UnexpectedStatus { status: u32, body: Vec<u8> },

    /// Transfer finished without a response code.
    #[error("received empty response from server")]
    EmptyResponse,

    /// Every attempt asked for a retry but none reported an error.
    #[error("{label}executor timeout after {attempts} attempts with {interval_ms} milliseconds wait intervals")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        interval_ms: u64,
    },

    /// Polled operation did not reach a terminal state in time.
    #[error("{label}polling timed out after {timeout:?}")]
    PollTimeout { label: String, timeout: Duration },

    /// Abort token was set while retrying.
    #[error("operation cancelled")]
    Cancelled,

    #[error("unknown operation status: {0}")]
    UnknownOperationStatus(String),

    #[error("invalid access token: {0}")]
    InvalidToken(String),

    /// Explode was requested but no extractor is configured on the client.
    #[error("archive extraction requested but no extractor is configured")]
    ExtractorMissing,
}

/// Status code carried by an error chain, if any link is `UnexpectedStatus`.
pub fn status_of(err: &anyhow::Error) -> Option<u32> {
    err.chain().find_map(|e| match e.downcast_ref::<TransferError>() {
        Some(TransferError::UnexpectedStatus { status, .. }) => Some(*status),
        _ => None,
    })
}
