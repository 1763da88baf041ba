//! Resilient HTTP transfer core for artifact repository clients.
//!
//! - `http`: blocking request pipeline on libcurl with retries and POST
//!   redirect replay.
//! - `transfer`: single-stream downloads and uploads with checksums, and the
//!   coordinator that escalates large downloads to `downloader`.
//! - `downloader`: concurrent range-request chunks merged in order.
//! - `auth`: shared credentials and single-flight token / SSH refresh.
//! - `service`: credential-aware client for one service.
//! - `poll`: waiting for asynchronous server operations.

pub mod auth;
pub mod checksum;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod logging;
pub mod poll;
pub mod progress;
pub mod retry;
pub mod segmenter;
pub mod service;
pub mod storage;
pub mod transfer;

pub use auth::ServiceDetails;
pub use error::TransferError;
pub use http::{ClientDetails, HttpClient, HttpClientBuilder, Method, Request, Response};
pub use poll::{OperationStatus, PollFailure, PollStep, PollingExecutor};
pub use retry::{Attempt, RetryExecutor, RetryPolicy};
pub use service::ServiceClient;
pub use transfer::{ChunkedDownload, DownloadDescriptor, DownloadOutcome, Downloader};
