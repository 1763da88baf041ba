//! Response and header parsing.

use std::fs::File;

/// Response headers of the final hop, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Parse raw header lines. A status line (`HTTP/...`) starts a new header
    /// block, so only the last response of a redirect chain is kept.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut headers = Vec::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.starts_with("HTTP/") {
                headers.clear();
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }
        Headers(headers)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length").and_then(|v| v.parse().ok())
    }
}

/// Outcome of one executed request.
#[derive(Debug)]
pub struct Response {
    pub status: u32,
    pub headers: Headers,
    /// Buffered body; empty when the body went to a file or was left open.
    pub body: Vec<u8>,
    /// Redirect target captured instead of followed.
    pub redirect_url: Option<String>,
    /// URL of the last hop.
    pub effective_url: String,
    pub(crate) stream: Option<File>,
}

impl Response {
    pub(crate) fn new(status: u32, headers: Headers, effective_url: String) -> Self {
        Self {
            status,
            headers,
            body: Vec::new(),
            redirect_url: None,
            effective_url,
            stream: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body left open by `read_remote_file`, positioned at its start.
    pub fn take_stream(&mut self) -> Option<File> {
        self.stream.take()
    }
}
