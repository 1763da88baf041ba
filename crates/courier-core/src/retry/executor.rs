//! Retry loop: run a probe until it stops asking for another attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::policy::RetryPolicy;
use crate::error::TransferError;

/// What a probe reports after one attempt.
#[derive(Debug)]
pub enum Attempt {
    /// Stop looping. `Ok` on success, `Err` for a failure that retrying will not fix.
    Stop(anyhow::Result<()>),
    /// Try again; carries the error that caused the retry, if there was one.
    Retry(Option<anyhow::Error>),
}

impl Attempt {
    pub fn done() -> Self {
        Attempt::Stop(Ok(()))
    }

    pub fn fail(err: anyhow::Error) -> Self {
        Attempt::Stop(Err(err))
    }
}

/// Runs a probe up to `max_retries + 1` times, sleeping between attempts.
///
/// Holds no knowledge of HTTP: the probe alone decides whether to go again.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    /// Prefix for every log line, e.g. `"[2]: "`.
    label: String,
    /// Appended to retry log lines.
    message: String,
    abort: Option<Arc<AtomicBool>>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Token checked after every failed attempt; once set, the loop stops with `Cancelled`.
    pub fn abort_token(mut self, abort: Option<Arc<AtomicBool>>) -> Self {
        self.abort = abort;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn execute<F>(&self, mut probe: F) -> anyhow::Result<()>
    where
        F: FnMut() -> Attempt,
    {
        let max = self.policy.max_retries;
        let mut last_err: Option<anyhow::Error>;
        let mut attempt = 0u32;
        loop {
            match probe() {
                Attempt::Stop(res) => return res,
                Attempt::Retry(err) => {
                    if self.cancelled() {
                        tracing::info!("{}retry executor was cancelled", self.label);
                        return Err(TransferError::Cancelled.into());
                    }
                    self.log_retry(attempt, err.as_ref());
                    last_err = err;
                }
            }
            if attempt >= max {
                break;
            }
            if self.policy.interval_ms > 0 {
                std::thread::sleep(self.policy.interval());
            }
            attempt += 1;
        }

        let attempts = self.policy.attempts();
        match last_err {
            Some(e) => {
                tracing::info!("{}", self.timeout_message());
                Err(e.context(format!("{}giving up after {} attempts", self.label, attempts)))
            }
            None => Err(TransferError::RetriesExhausted {
                label: self.label.clone(),
                attempts: max,
                interval_ms: self.policy.interval_ms,
            }
            .into()),
        }
    }

    fn cancelled(&self) -> bool {
        self.abort
            .as_ref()
            .map(|a| a.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn timeout_message(&self) -> String {
        format!(
            "{}executor timeout after {} attempts with {} milliseconds wait intervals",
            self.label, self.policy.max_retries, self.policy.interval_ms
        )
    }

    fn log_retry(&self, attempt: u32, err: Option<&anyhow::Error>) {
        let mut line = format!("{}(Attempt {})", self.label, attempt + 1);
        if !self.message.is_empty() {
            line = format!("{} - {}", line, self.message);
        }
        match err {
            Some(e) => tracing::warn!("{}: {:#}", line, e),
            None if !self.message.is_empty() => tracing::warn!("{}", line),
            None => tracing::debug!("{}", line),
        }
    }
}
