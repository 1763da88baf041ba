//! Request pipeline: authentication, retries and POST redirect replay.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use super::details::ClientDetails;
use super::perform::PerformError;
use super::request::{Method, Request, MAX_REDIRECTS};
use super::response::Response;
use super::transport::TransportConfig;
use super::HttpClientBuilder;
use crate::error::TransferError;
use crate::retry::{classify_curl_error, should_retry, Attempt, AttemptOutcome, RetryExecutor, RetryPolicy};
use crate::transfer::Extractor;

/// Blocking HTTP client shared by all transfer operations.
///
/// Cheap to clone; clones share transport settings and the abort token.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) transport: Arc<TransportConfig>,
    pub(crate) retry: RetryPolicy,
    pub(crate) abort: Option<Arc<AtomicBool>>,
    pub(crate) api_key_header: String,
    pub(crate) user_agent: String,
    pub(crate) extractor: Option<Arc<dyn Extractor>>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("transport", &self.transport)
            .field("retry", &self.retry)
            .field("abort", &self.abort.is_some())
            .field("user_agent", &self.user_agent)
            .field("extractor", &self.extractor.is_some())
            .finish()
    }
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// A retry executor carrying this client's policy and abort token.
    pub fn executor(&self) -> RetryExecutor {
        RetryExecutor::new(self.retry.clone()).abort_token(self.abort.clone())
    }

    pub(crate) fn cancel_flag(&self) -> Option<&AtomicBool> {
        self.abort.as_deref()
    }

    /// True once this client's abort token has been set.
    pub fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|a| a.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// A clone of this client stopped by `abort` instead of its own token.
    pub(crate) fn with_abort_token(&self, abort: Arc<AtomicBool>) -> Self {
        Self {
            abort: Some(abort),
            ..self.clone()
        }
    }

    /// Send a request with retries.
    ///
    /// With `close_body` the body is buffered into `Response::body`; otherwise it
    /// is left open (spooled to a temp file) and available via `take_stream`.
    pub fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
        follow_redirect: bool,
        close_body: bool,
        details: &ClientDetails,
    ) -> Result<Response> {
        let mut req = Request::new(method, url).follow_redirect(follow_redirect);
        if let Some(body) = body {
            req = req.body(body.to_vec());
        }
        self.execute(&req, close_body, details)
    }

    /// Run a prepared request through the retry loop.
    ///
    /// Transport failures, 5xx and 429 are retried; any other response ends the
    /// loop and is returned as is. A followed POST redirect is replayed as a
    /// POST with the same body.
    pub fn execute(&self, req: &Request, close_body: bool, details: &ClientDetails) -> Result<Response> {
        let mut response = None;
        self.executor()
            .message(format!(
                "Failure occurred while sending {} request to {}",
                req.method, req.url
            ))
            .execute(|| {
                tracing::debug!("Sending HTTP {} request to: {}", req.method, req.url);
                let resp = match self.send_once(req, close_body, details) {
                    Ok(resp) => resp,
                    Err(e) if e.is_retryable() => {
                        if let PerformError::Transport(ce) = &e {
                            tracing::debug!("transport failure: {:?}", classify_curl_error(ce));
                        }
                        return Attempt::Retry(Some(e.into_anyhow()));
                    }
                    Err(e) => return Attempt::fail(e.into_anyhow()),
                };
                if req.method == Method::Post && req.follow_redirect && resp.is_redirect() {
                    if let Some(location) = resp.redirect_url.as_deref() {
                        return match self.replay_post(req, location, close_body, details) {
                            Ok(r) => {
                                response = Some(r);
                                Attempt::done()
                            }
                            Err(e) => Attempt::fail(e),
                        };
                    }
                }
                if resp.status == 0 {
                    return Attempt::fail(TransferError::EmptyResponse.into());
                }
                if should_retry(AttemptOutcome::Status(resp.status)) {
                    return Attempt::Retry(Some(
                        TransferError::UnexpectedStatus {
                            status: resp.status,
                            body: resp.body,
                        }
                        .into(),
                    ));
                }
                response = Some(resp);
                Attempt::done()
            })
            .with_context(|| format!("{} {}", req.method, req.url))?;
        response.ok_or_else(|| TransferError::EmptyResponse.into())
    }

    fn replay_post(
        &self,
        req: &Request,
        location: &str,
        close_body: bool,
        details: &ClientDetails,
    ) -> Result<Response> {
        if req.redirects >= MAX_REDIRECTS {
            bail!("stopped after {} redirects", MAX_REDIRECTS);
        }
        tracing::debug!("Following POST redirect from {} to {}", req.url, location);
        self.execute(&req.redirected(location), close_body, details)
    }

    fn send_once(&self, req: &Request, close_body: bool, details: &ClientDetails) -> Result<Response, PerformError> {
        if close_body {
            let mut body = Vec::new();
            let mut resp = self.perform(req, details, &mut body, None, self.cancel_flag())?;
            resp.body = body;
            Ok(resp)
        } else {
            let mut file = tempfile::tempfile().map_err(PerformError::Sink)?;
            let mut resp = self.perform(req, details, &mut file, None, self.cancel_flag())?;
            file.seek(SeekFrom::Start(0)).map_err(PerformError::Sink)?;
            resp.stream = Some(file);
            Ok(resp)
        }
    }

    pub fn send_get(&self, url: &str, follow_redirect: bool, details: &ClientDetails) -> Result<Response> {
        self.send(Method::Get, url, None, follow_redirect, true, details)
    }

    pub fn send_post(&self, url: &str, body: &[u8], details: &ClientDetails) -> Result<Response> {
        self.send(Method::Post, url, Some(body), true, true, details)
    }

    pub fn send_put(&self, url: &str, body: &[u8], details: &ClientDetails) -> Result<Response> {
        self.send(Method::Put, url, Some(body), true, true, details)
    }

    pub fn send_patch(&self, url: &str, body: &[u8], details: &ClientDetails) -> Result<Response> {
        self.send(Method::Patch, url, Some(body), true, true, details)
    }

    pub fn send_delete(&self, url: &str, body: Option<&[u8]>, details: &ClientDetails) -> Result<Response> {
        self.send(Method::Delete, url, body, true, true, details)
    }

    pub fn send_head(&self, url: &str, details: &ClientDetails) -> Result<Response> {
        self.send(Method::Head, url, None, true, true, details)
    }

    /// GET with the body left open. On 200 the body is available through
    /// `Response::take_stream`; any other status comes back with the body
    /// buffered for inspection.
    pub fn read_remote_file(&self, url: &str, details: &ClientDetails) -> Result<Response> {
        let mut resp = self.send(Method::Get, url, None, true, false, details)?;
        if resp.status != 200 {
            if let Some(mut stream) = resp.stream.take() {
                let mut body = Vec::new();
                if let Err(e) = stream.read_to_end(&mut body) {
                    tracing::warn!("failed reading error body from {}: {}", url, e);
                }
                resp.body = body;
            }
        }
        Ok(resp)
    }

    pub fn extractor(&self) -> Option<&Arc<dyn Extractor>> {
        self.extractor.as_ref()
    }
}
