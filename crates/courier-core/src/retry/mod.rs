//! Bounded retry execution.
//!
//! The executor only loops and sleeps; whether an attempt is worth repeating is
//! decided by the caller's probe, usually through the pure classifiers in
//! `classify`, so the policy can be tested without any I/O.

mod classify;
mod executor;
mod policy;

pub use classify::{classify_curl_error, classify_http_status, should_retry, AttemptOutcome, ErrorKind};
pub use executor::{Attempt, RetryExecutor};
pub use policy::RetryPolicy;
