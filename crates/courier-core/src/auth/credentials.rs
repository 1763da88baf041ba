//! Shared credential configuration of one service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use super::expiry::{ExpiryManager, SshAuthenticator, TokenRefresher};
use crate::config::CourierConfig;
use crate::http::{ClientDetails, HttpClientBuilder};

/// URL and credentials for one service, shared (behind an `Arc`) by every
/// request sent to it. Token and SSH headers live in the expiry manager so
/// a refresh is seen by all callers.
#[derive(Debug)]
pub struct ServiceDetails {
    user: String,
    password: String,
    api_key: String,
    client_cert_path: Option<PathBuf>,
    client_cert_key_path: Option<PathBuf>,
    expiry: ExpiryManager,
}

impl ServiceDetails {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            api_key: String::new(),
            client_cert_path: None,
            client_cert_key_path: None,
            expiry: ExpiryManager::new(url, ""),
        }
    }

    pub fn basic(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn access_token(self, token: impl Into<String>) -> Self {
        self.expiry.set_access_token(token);
        self
    }

    pub fn client_cert(mut self, cert: Option<PathBuf>, key: Option<PathBuf>) -> Self {
        self.client_cert_path = cert;
        self.client_cert_key_path = key;
        self
    }

    pub fn token_refresher(mut self, refresher: TokenRefresher) -> Self {
        self.expiry = self.expiry.refresher(refresher);
        self
    }

    pub fn ssh_authenticator(mut self, ssh: Arc<dyn SshAuthenticator>, ssh_url: Option<String>) -> Self {
        self.expiry = self.expiry.ssh_authenticator(ssh, ssh_url);
        self
    }

    /// Take the refresh threshold and SSH wait from the config file.
    pub fn expiry_settings(mut self, cfg: &CourierConfig) -> Self {
        self.expiry = self
            .expiry
            .refresh_before_expiry_minutes(cfg.refresh_before_expiry_minutes as i64)
            .ssh_refresh_wait(cfg.ssh_refresh_wait());
        self
    }

    pub fn ssh_refresh_wait(mut self, wait: Duration) -> Self {
        self.expiry = self.expiry.ssh_refresh_wait(wait);
        self
    }

    /// Current base URL; an SSH login replaces it with the HTTP URL it returns.
    pub fn url(&self) -> String {
        self.expiry.url()
    }

    pub fn expiry(&self) -> &ExpiryManager {
        &self.expiry
    }

    pub fn is_ssh_authentication(&self) -> bool {
        self.expiry.is_ssh_authentication()
    }

    /// Log in over SSH if this service is addressed by an `ssh://` URL and no
    /// SSH headers were obtained yet.
    pub fn authenticate_ssh_if_needed(&self) -> Result<()> {
        if self.is_ssh_authentication() && self.expiry.ssh_headers().is_empty() {
            self.expiry.authenticate_ssh()?;
        }
        Ok(())
    }

    /// Fresh per-request snapshot of the current credentials.
    pub fn create_client_details(&self) -> ClientDetails {
        ClientDetails {
            user: self.user.clone(),
            password: self.password.clone(),
            api_key: self.api_key.clone(),
            access_token: self.expiry.access_token(),
            headers: self.expiry.ssh_headers(),
        }
    }

    /// Hooks run on the caller's snapshot before every request.
    pub fn run_pre_request_interceptors(&self, details: &mut ClientDetails) -> Result<()> {
        self.expiry.handle_token_expiry(details)
    }

    /// Client builder carrying this service's client certificate.
    pub fn http_client_builder(&self, cfg: &CourierConfig) -> HttpClientBuilder {
        let builder = HttpClientBuilder::from_config(cfg);
        if self.client_cert_path.is_some() {
            builder.client_cert(self.client_cert_path.clone(), self.client_cert_key_path.clone())
        } else {
            builder
        }
    }
}
