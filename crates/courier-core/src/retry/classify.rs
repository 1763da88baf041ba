//! Classify HTTP status and curl errors into retry decisions.

/// High-level classification of a failure, mostly for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Retryable server error (5xx).
    Http5xx(u16),
    /// Anything else; never retried on status alone.
    Other,
}

/// What a single request attempt produced.
#[derive(Debug)]
pub enum AttemptOutcome<'a> {
    /// The transport failed before a response was read.
    Transport(&'a anyhow::Error),
    /// A response arrived with this status code.
    Status(u32),
    /// The transfer finished without a response code.
    Empty,
}

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Retry decision shared by the request pipeline, uploads and chunk workers.
///
/// Any transport failure is retried; a response is retried only for 5xx and 429.
pub fn should_retry(outcome: AttemptOutcome<'_>) -> bool {
    match outcome {
        AttemptOutcome::Transport(_) => true,
        AttemptOutcome::Status(code) => classify_http_status(code) != ErrorKind::Other,
        AttemptOutcome::Empty => false,
    }
}
