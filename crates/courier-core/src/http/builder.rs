//! Builder for `HttpClient`.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use super::auth::{DEFAULT_API_KEY_HEADER, USER_AGENT};
use super::transport::{HandleCustomizer, TransportConfig};
use super::HttpClient;
use crate::config::CourierConfig;
use crate::retry::RetryPolicy;
use crate::transfer::Extractor;

#[derive(Default)]
pub struct HttpClientBuilder {
    transport: TransportConfig,
    retry: RetryPolicy,
    abort: Option<Arc<AtomicBool>>,
    api_key_header: Option<String>,
    user_agent: Option<String>,
    extractor: Option<Arc<dyn Extractor>>,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport and retry settings from the config file.
    pub fn from_config(cfg: &CourierConfig) -> Self {
        Self::new()
            .connect_timeout(cfg.connect_timeout())
            .overall_timeout(cfg.request_timeout())
            .insecure_tls(cfg.insecure_tls)
            .certificates_dir(cfg.certificates_dir.clone())
            .client_cert(cfg.client_cert_path.clone(), cfg.client_cert_key_path.clone())
            .retry_policy(cfg.retry_policy())
    }

    /// Directory of extra trusted CA certificates (hashed, as for `c_rehash`).
    pub fn certificates_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.transport.certificates_dir = dir;
        self
    }

    /// Client certificate for mutual TLS; the key defaults to the certificate file.
    pub fn client_cert(mut self, cert: Option<PathBuf>, key: Option<PathBuf>) -> Self {
        self.transport.client_cert_path = cert;
        self.transport.client_cert_key_path = key;
        self
    }

    pub fn insecure_tls(mut self, insecure: bool) -> Self {
        self.transport.insecure_tls = insecure;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = timeout;
        self
    }

    pub fn overall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transport.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retry.max_retries = retries;
        self
    }

    pub fn retry_interval_ms(mut self, interval_ms: u64) -> Self {
        self.retry.interval_ms = interval_ms;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Token that stops retry loops and in-flight transfers once set.
    pub fn abort_token(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Hook run on every curl handle after the built-in settings.
    pub fn handle_customizer(mut self, customizer: HandleCustomizer) -> Self {
        self.transport.customizer = Some(customizer);
        self
    }

    pub fn api_key_header(mut self, name: impl Into<String>) -> Self {
        self.api_key_header = Some(name.into());
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        if let Some(dir) = &self.transport.certificates_dir {
            if !dir.is_dir() {
                bail!("certificates directory {} does not exist", dir.display());
            }
        }
        if let Some(cert) = &self.transport.client_cert_path {
            if !cert.is_file() {
                bail!("failed loading client certificate {}", cert.display());
            }
        }
        if let Some(key) = &self.transport.client_cert_key_path {
            if self.transport.client_cert_path.is_none() {
                bail!("client certificate key {} given without a certificate", key.display());
            }
            if !key.is_file() {
                bail!("failed loading client certificate key {}", key.display());
            }
        }
        Ok(HttpClient {
            transport: Arc::new(self.transport),
            retry: self.retry,
            abort: self.abort,
            api_key_header: self
                .api_key_header
                .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string()),
            user_agent: self.user_agent.unwrap_or_else(|| USER_AGENT.to_string()),
            extractor: self.extractor,
        })
    }
}
