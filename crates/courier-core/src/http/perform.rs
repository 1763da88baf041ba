//! One curl exchange: no retries, no redirect replay.

use std::cell::Cell;
use std::io::{self, Read, Write};
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};

use curl::easy::{Easy, List, ReadError};

use super::auth::request_headers;
use super::details::ClientDetails;
use super::request::{Method, Request, MAX_REDIRECTS};
use super::response::{Headers, Response};
use super::HttpClient;

/// Why a single exchange produced no response.
#[derive(Debug, thiserror::Error)]
pub(crate) enum PerformError {
    /// Connection, TLS, DNS or timeout failure. Always worth another attempt.
    #[error(transparent)]
    Transport(#[from] curl::Error),
    /// The local body sink failed (disk full, closed pipe).
    #[error("writing response body")]
    Sink(#[source] io::Error),
    #[error("transfer cancelled")]
    Cancelled,
}

/// True when `err` is a transport failure worth another attempt.
pub(crate) fn is_retryable_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<PerformError>()
        .map(PerformError::is_retryable)
        .unwrap_or(false)
}

impl PerformError {
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, PerformError::Transport(_))
    }

    pub(crate) fn into_anyhow(self) -> anyhow::Error {
        match self {
            PerformError::Cancelled => crate::error::TransferError::Cancelled.into(),
            other => other.into(),
        }
    }
}

/// Bytes of an unexpected response body kept for error reporting.
const MAX_DIVERTED_BODY: usize = 64 * 1024;

/// Status code of a raw `HTTP/1.1 206 Partial Content` line.
fn status_line_code(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Streamed request body with its declared length.
pub(crate) struct Upload<'a> {
    pub reader: &'a mut dyn Read,
    pub size: u64,
}

fn set_method(
    easy: &mut Easy,
    method: Method,
    body: Option<&[u8]>,
    upload_size: Option<u64>,
) -> Result<(), curl::Error> {
    match method {
        Method::Get => easy.get(true),
        Method::Head => easy.nobody(true),
        Method::Post => {
            easy.post(true)?;
            match (body, upload_size) {
                (_, Some(size)) => easy.post_field_size(size),
                (Some(body), None) => easy.post_fields_copy(body),
                (None, None) => easy.post_field_size(0),
            }
        }
        Method::Put | Method::Patch | Method::Delete => {
            match (body, upload_size) {
                (_, Some(size)) => {
                    easy.upload(true)?;
                    easy.in_filesize(size)?;
                }
                (Some(body), None) => easy.post_fields_copy(body)?,
                (None, None) if method != Method::Delete => easy.post_fields_copy(&[])?,
                (None, None) => {}
            }
            easy.custom_request(method.as_str())
        }
    }
}

impl HttpClient {
    /// Execute `req` once, streaming the body into `out`.
    ///
    /// The returned response has an empty `body`; the bytes went to `out`.
    pub(crate) fn perform(
        &self,
        req: &Request,
        details: &ClientDetails,
        out: &mut dyn Write,
        upload: Option<Upload<'_>>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Response, PerformError> {
        let mut easy = self.transport.new_handle()?;
        easy.url(&req.url)?;
        let follow = req.auto_follow();
        easy.follow_location(follow)?;
        if follow {
            easy.max_redirections(MAX_REDIRECTS)?;
        }
        let upload_size = upload.as_ref().map(|u| u.size);
        set_method(&mut easy, req.method, req.body.as_deref(), upload_size)?;

        let mut list = List::new();
        for (k, v) in request_headers(details, &self.api_key_header, &self.user_agent, &req.headers) {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        // Send the body right away instead of waiting for 100-continue.
        list.append("Expect:")?;
        easy.http_headers(list)?;
        if cancel.is_some() {
            easy.progress(true)?;
        }

        let mut lines: Vec<String> = Vec::new();
        let mut sink_error: Option<io::Error> = None;
        let mut diverted: Vec<u8> = Vec::new();
        let mut diverted_overflow = false;
        let last_status = Cell::new(0u32);
        let result = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let s = s.trim_end();
                    if let Some(code) = status_line_code(s) {
                        last_status.set(code);
                    }
                    lines.push(s.to_string());
                }
                true
            })?;
            transfer.write_function(|data| {
                if matches!(req.expect_status, Some(expected) if expected != last_status.get()) {
                    let room = MAX_DIVERTED_BODY - diverted.len();
                    if data.len() > room {
                        diverted.extend_from_slice(&data[..room]);
                        diverted_overflow = true;
                        return Ok(0);
                    }
                    diverted.extend_from_slice(data);
                    return Ok(data.len());
                }
                match out.write_all(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        sink_error = Some(e);
                        Ok(0)
                    }
                }
            })?;
            if let Some(Upload { reader, .. }) = upload {
                transfer.read_function(move |buf| reader.read(buf).map_err(|_| ReadError::Abort))?;
            }
            if let Some(cancel) = cancel {
                transfer.progress_function(move |_, _, _, _| !cancel.load(Ordering::Relaxed))?;
            }
            transfer.perform()
        };
        if let Err(e) = result {
            if e.is_write_error() && diverted_overflow {
                tracing::debug!("dropped oversized HTTP {} body from {}", last_status.get(), req.url);
            } else if let (true, Some(io_err)) = (e.is_write_error(), sink_error.take()) {
                return Err(PerformError::Sink(io_err));
            } else if e.is_aborted_by_callback() && cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
                return Err(PerformError::Cancelled);
            } else {
                return Err(PerformError::Transport(e));
            }
        }

        let status = easy.response_code()?;
        let effective_url = easy
            .effective_url()?
            .map(str::to_string)
            .unwrap_or_else(|| req.url.clone());
        let mut response = Response::new(status, Headers::from_lines(&lines), effective_url);
        response.body = diverted;
        if !follow {
            response.redirect_url = easy.redirect_url()?.map(str::to_string);
        }
        tracing::debug!("{} {} -> HTTP {}", req.method, req.url, status);
        Ok(response)
    }
}
