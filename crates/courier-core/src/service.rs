//! Credential-aware front end over `HttpClient` for one service.
//!
//! Every call works on the caller's `ClientDetails` snapshot: the bearer
//! token is refreshed before sending when it is about to expire, and an HTTP
//! 401 that the expiry manager can fix (SSH re-login, token refresh) causes
//! the call to be sent exactly once more with the refreshed credentials.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::auth::ServiceDetails;
use crate::error::status_of;
use crate::http::{ClientDetails, HttpClient, Method, Response};
use crate::progress::ProgressMgr;
use crate::transfer::{ChunkedDownload, DownloadDescriptor, DownloadOutcome, Downloader, RemoteFileDetails};

/// Status used to decide whether a call hit an authentication failure.
trait ResponseStatus {
    fn response_status(&self) -> Option<u32>;
}

impl ResponseStatus for Response {
    fn response_status(&self) -> Option<u32> {
        Some(self.status)
    }
}

impl<T> ResponseStatus for (T, Response) {
    fn response_status(&self) -> Option<u32> {
        Some(self.1.status)
    }
}

impl ResponseStatus for DownloadOutcome {
    fn response_status(&self) -> Option<u32> {
        match self {
            DownloadOutcome::Skipped => None,
            DownloadOutcome::Downloaded(r) | DownloadOutcome::Unexpected(r) => Some(r.status),
        }
    }
}

/// URL-encode `form` as an `application/x-www-form-urlencoded` body.
pub fn encode_form(form: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form)
        .finish()
}

/// Join a service base URL and an API path with exactly one `/`.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: HttpClient,
    details: Arc<ServiceDetails>,
}

impl ServiceClient {
    pub fn new(client: HttpClient, details: Arc<ServiceDetails>) -> Self {
        Self { client, details }
    }

    pub fn http_client(&self) -> &HttpClient {
        &self.client
    }

    pub fn service_details(&self) -> &Arc<ServiceDetails> {
        &self.details
    }

    /// A fresh credential snapshot for one call (or one sequence of calls).
    pub fn client_details(&self) -> ClientDetails {
        self.details.create_client_details()
    }

    /// Absolute URL of `path` under the service's current base URL.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.details.url(), path)
    }

    fn run<T, F>(&self, details: &mut ClientDetails, op: F) -> Result<T>
    where
        T: ResponseStatus,
        F: Fn(&HttpClient, &ClientDetails) -> Result<T>,
    {
        self.details.run_pre_request_interceptors(details)?;
        let out = match op(&self.client, details) {
            Ok(out) => out,
            Err(e) if status_of(&e) == Some(401) => {
                if self.details.expiry().handle_expiry_status(401, details)? {
                    tracing::debug!("credentials refreshed after HTTP 401, sending again");
                    return self.reissue(details, op);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let Some(status) = out.response_status() else {
            return Ok(out);
        };
        if self.details.expiry().handle_expiry_status(status, details)? {
            tracing::debug!("credentials refreshed after HTTP {}, sending again", status);
            return self.reissue(details, op);
        }
        Ok(out)
    }

    /// Second and last attempt after a credential refresh.
    fn reissue<T, F>(&self, details: &mut ClientDetails, op: F) -> Result<T>
    where
        F: Fn(&HttpClient, &ClientDetails) -> Result<T>,
    {
        self.details.run_pre_request_interceptors(details)?;
        op(&self.client, details)
    }

    pub fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
        follow_redirect: bool,
        close_body: bool,
        details: &mut ClientDetails,
    ) -> Result<Response> {
        self.run(details, |c, d| c.send(method, url, body, follow_redirect, close_body, d))
    }

    pub fn send_get(&self, url: &str, follow_redirect: bool, details: &mut ClientDetails) -> Result<Response> {
        self.run(details, |c, d| c.send_get(url, follow_redirect, d))
    }

    pub fn send_post(&self, url: &str, body: &[u8], details: &mut ClientDetails) -> Result<Response> {
        self.run(details, |c, d| c.send_post(url, body, d))
    }

    /// POST `form` URL-encoded, with the matching `Content-Type`.
    pub fn send_post_form(&self, url: &str, form: &[(&str, &str)], details: &mut ClientDetails) -> Result<Response> {
        details.set_header("Content-Type", "application/x-www-form-urlencoded");
        let body = encode_form(form);
        self.send_post(url, body.as_bytes(), details)
    }

    pub fn send_put(&self, url: &str, body: &[u8], details: &mut ClientDetails) -> Result<Response> {
        self.run(details, |c, d| c.send_put(url, body, d))
    }

    pub fn send_patch(&self, url: &str, body: &[u8], details: &mut ClientDetails) -> Result<Response> {
        self.run(details, |c, d| c.send_patch(url, body, d))
    }

    pub fn send_delete(&self, url: &str, body: Option<&[u8]>, details: &mut ClientDetails) -> Result<Response> {
        self.run(details, |c, d| c.send_delete(url, body, d))
    }

    pub fn send_head(&self, url: &str, details: &mut ClientDetails) -> Result<Response> {
        self.run(details, |c, d| c.send_head(url, d))
    }

    pub fn read_remote_file(&self, url: &str, details: &mut ClientDetails) -> Result<Response> {
        self.run(details, |c, d| c.read_remote_file(url, d))
    }

    pub fn upload_file(
        &self,
        local_path: &Path,
        url: &str,
        details: &mut ClientDetails,
        progress: Option<&dyn ProgressMgr>,
    ) -> Result<Response> {
        self.run(details, |c, d| c.upload_file(local_path, url, d, progress))
    }

    /// Single attempt; a consumed reader cannot be sent again after a 401.
    pub fn upload_file_from_reader(
        &self,
        reader: &mut dyn Read,
        url: &str,
        details: &mut ClientDetails,
        size: u64,
    ) -> Result<Response> {
        self.details.run_pre_request_interceptors(details)?;
        self.client.upload_file_from_reader(reader, url, details, size)
    }

    pub fn download_file(
        &self,
        d: &DownloadDescriptor,
        details: &mut ClientDetails,
        progress: Option<&dyn ProgressMgr>,
    ) -> Result<Response> {
        self.run(details, |c, cd| c.download_file(d, cd, progress))
    }

    pub fn download_file_concurrently(
        &self,
        flags: &ChunkedDownload,
        details: &mut ClientDetails,
        progress: Option<&dyn ProgressMgr>,
    ) -> Result<Response> {
        self.run(details, |c, d| c.download_file_concurrently(flags, d, progress))
    }

    pub fn is_accept_ranges(&self, url: &str, details: &mut ClientDetails) -> Result<(bool, Response)> {
        self.run(details, |c, d| c.is_accept_ranges(url, d))
    }

    pub fn get_remote_file_details(
        &self,
        url: &str,
        details: &mut ClientDetails,
    ) -> Result<(Option<RemoteFileDetails>, Response)> {
        self.run(details, |c, d| c.get_remote_file_details(url, d))
    }

    /// Coordinated download (probe, skip-if-unchanged, single or chunked).
    pub fn download(
        &self,
        downloader: &Downloader<'_>,
        d: &DownloadDescriptor,
        details: &mut ClientDetails,
    ) -> Result<DownloadOutcome> {
        self.run(details, |_, cd| downloader.download(d.clone(), cd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_is_url_encoded() {
        assert_eq!(
            encode_form(&[("grant_type", "refresh_token"), ("scope", "applied-permissions/user a&b")]),
            "grant_type=refresh_token&scope=applied-permissions%2Fuser+a%26b"
        );
    }

    #[test]
    fn join_url_uses_single_slash() {
        assert_eq!(join_url("https://h/artifactory/", "/api/system/ping"), "https://h/artifactory/api/system/ping");
        assert_eq!(join_url("https://h/artifactory", "api/x"), "https://h/artifactory/api/x");
    }

    #[test]
    fn client_details_come_from_shared_credentials() {
        let sd = Arc::new(ServiceDetails::new("https://h/artifactory/").basic("u", "p"));
        let client = HttpClient::builder().build().unwrap();
        let sc = ServiceClient::new(client, sd);
        let d = sc.client_details();
        assert_eq!(d.user, "u");
        assert_eq!(sc.url_for("api/repositories"), "https://h/artifactory/api/repositories");
    }
}
