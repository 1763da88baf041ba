//! Blocking HTTP request pipeline on libcurl.
//!
//! Every attempt uses a fresh `Easy` handle built from the client's
//! `TransportConfig`, so redirect policy and headers never leak between
//! concurrent requests.

mod auth;
mod builder;
mod client;
mod details;
mod perform;
mod request;
mod response;
mod transport;

pub use auth::{auth_header, request_headers, DEFAULT_API_KEY_HEADER, USER_AGENT};
pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use details::ClientDetails;
pub(crate) use perform::{is_retryable_error, Upload};
pub use request::{Method, Request, MAX_REDIRECTS};
pub use response::{Headers, Response};
pub use transport::{HandleCustomizer, TransportConfig};
