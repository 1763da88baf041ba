//! Waiting for long-running server-side operations.
//!
//! `PollingExecutor` runs a probe on the retry loop, one attempt per poll
//! interval, until the probe reports a terminal state or the timeout passes.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::error::TransferError;
use crate::retry::{Attempt, RetryExecutor, RetryPolicy};

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep<T> {
    /// Not terminal yet; poll again after the interval. A payload replaces
    /// the latest one kept for a failed run.
    Continue(Option<T>),
    /// Terminal; stop and hand back the payload.
    Stop(T),
}

/// A polling run that ended without a terminal state: the probe failed or
/// the timeout passed. Carries the latest payload the probe reported.
#[derive(Debug)]
pub struct PollFailure<T> {
    pub error: anyhow::Error,
    pub last_payload: Option<T>,
}

impl<T> PollFailure<T> {
    pub fn into_error(self) -> anyhow::Error {
        self.error
    }
}

impl<T> fmt::Display for PollFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

#[derive(Debug, Clone)]
pub struct PollingExecutor {
    timeout: Duration,
    interval: Duration,
    label: String,
}

impl PollingExecutor {
    /// An interval longer than the timeout is cut down to the timeout.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1)).min(timeout);
        Self {
            timeout,
            interval,
            label: String::new(),
        }
    }

    /// Prefix for log lines and the timeout error.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn policy(&self) -> RetryPolicy {
        let interval_ms = self.interval.as_millis().max(1);
        let retries = self.timeout.as_millis() / interval_ms;
        RetryPolicy::new(u32::try_from(retries).unwrap_or(u32::MAX), interval_ms as u64)
    }

    fn timed_out(&self) -> anyhow::Error {
        TransferError::PollTimeout {
            label: self.label.clone(),
            timeout: self.timeout,
        }
        .into()
    }

    /// Run `probe` until it returns `Stop`, fails, or the timeout elapses.
    /// A probe error ends polling immediately and is returned as is, along
    /// with the latest payload.
    pub fn execute<T, F>(&self, mut probe: F) -> Result<T, PollFailure<T>>
    where
        F: FnMut() -> Result<PollStep<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut payload = None;
        let mut stopped = false;
        let res = RetryExecutor::new(self.policy())
            .label(self.label.clone())
            .execute(|| match probe() {
                Ok(PollStep::Stop(p)) => {
                    payload = Some(p);
                    stopped = true;
                    Attempt::done()
                }
                Ok(PollStep::Continue(p)) => {
                    if p.is_some() {
                        payload = p;
                    }
                    if Instant::now() >= deadline {
                        Attempt::fail(self.timed_out())
                    } else {
                        Attempt::Retry(None)
                    }
                }
                Err(e) => Attempt::fail(e),
            });
        let error = match res {
            Ok(()) if stopped => {
                if let Some(p) = payload {
                    return Ok(p);
                }
                self.timed_out()
            }
            Ok(()) => self.timed_out(),
            Err(e) if matches!(e.downcast_ref::<TransferError>(), Some(TransferError::RetriesExhausted { .. })) => {
                tracing::info!("{}polling timed out after {:?}", self.label, self.timeout);
                self.timed_out()
            }
            Err(e) => e,
        };
        Err(PollFailure {
            error,
            last_payload: payload,
        })
    }
}

/// State of an asynchronous server operation (bundle creation, promotion,
/// export, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Rejected,
    Deleting,
}

impl OperationStatus {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationStatus::Pending | OperationStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::Processing => "PROCESSING",
            OperationStatus::Completed => "COMPLETED",
            OperationStatus::Failed => "FAILED",
            OperationStatus::Rejected => "REJECTED",
            OperationStatus::Deleting => "DELETING",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OperationStatus::Pending),
            "PROCESSING" => Ok(OperationStatus::Processing),
            "COMPLETED" => Ok(OperationStatus::Completed),
            "FAILED" => Ok(OperationStatus::Failed),
            "REJECTED" => Ok(OperationStatus::Rejected),
            "DELETING" => Ok(OperationStatus::Deleting),
            other => Err(TransferError::UnknownOperationStatus(other.to_string())),
        }
    }
}

/// Poll `fetch` (returning the raw status string and the response payload)
/// until the status is terminal. An unrecognised status stops polling with
/// `UnknownOperationStatus`; a failure keeps the last known status and payload.
pub fn poll_status<T, F>(
    executor: &PollingExecutor,
    mut fetch: F,
) -> Result<(OperationStatus, T), PollFailure<(OperationStatus, T)>>
where
    F: FnMut() -> Result<(String, T)>,
{
    executor.execute(|| {
        let (raw, payload) = fetch()?;
        let status: OperationStatus = raw.parse()?;
        tracing::debug!("{}operation status: {}", executor.label, status);
        Ok(if status.is_terminal() {
            PollStep::Stop((status, payload))
        } else {
            PollStep::Continue(Some((status, payload)))
        })
    })
}
