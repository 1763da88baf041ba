//! HEAD probes: size, checksums and range support of a remote file.

use anyhow::{Context, Result};

use crate::checksum::ChecksumSet;
use crate::http::{ClientDetails, Headers, HttpClient, Response};

/// Metadata of a remote file, as advertised by its response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFileDetails {
    /// `Content-Length`, 0 when absent.
    pub size: u64,
    /// `X-Checksum-*` values; empty strings when the server sends none.
    pub checksums: ChecksumSet,
    /// Server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Parse file metadata from response headers.
pub(crate) fn parse_file_details(headers: &Headers) -> Result<RemoteFileDetails> {
    let size = match headers.get("content-length") {
        Some(v) if !v.is_empty() => v
            .parse::<u64>()
            .with_context(|| format!("invalid Content-Length: {}", v))?,
        _ => 0,
    };
    let checksum = |name: &str| headers.get(name).unwrap_or_default().to_ascii_lowercase();
    Ok(RemoteFileDetails {
        size,
        checksums: ChecksumSet {
            sha1: checksum("x-checksum-sha1"),
            md5: checksum("x-checksum-md5"),
            sha256: checksum("x-checksum-sha256"),
        },
        accept_ranges: headers
            .get("accept-ranges")
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false),
        etag: headers.get("etag").map(|v| v.trim_matches('"').to_string()),
        last_modified: headers.get("last-modified").map(str::to_string),
    })
}

impl HttpClient {
    /// HEAD the URL. Details are `None` when the status is not 200; the
    /// response is returned either way for the caller to inspect.
    pub fn get_remote_file_details(
        &self,
        url: &str,
        details: &ClientDetails,
    ) -> Result<(Option<RemoteFileDetails>, Response)> {
        let resp = self.send_head(url, details)?;
        if resp.status != 200 {
            return Ok((None, resp));
        }
        let file = parse_file_details(&resp.headers).with_context(|| format!("HEAD {}", url))?;
        Ok((Some(file), resp))
    }

    /// Whether the server serves byte ranges for `url`. Only meaningful when
    /// the returned response has status 200.
    pub fn is_accept_ranges(&self, url: &str, details: &ClientDetails) -> Result<(bool, Response)> {
        let resp = self.send_head(url, details)?;
        if resp.status != 200 {
            return Ok((false, resp));
        }
        let accept = resp
            .header("accept-ranges")
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);
        Ok((accept, resp))
    }
}
