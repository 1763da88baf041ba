//! Per-client transport settings applied to every fresh curl handle.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use curl::easy::Easy;

/// Last word on a handle before it is used: callers may set any curl option.
pub type HandleCustomizer = Arc<dyn Fn(&mut Easy) -> Result<(), curl::Error> + Send + Sync>;

/// Settings fixed once per client. A new `Easy` is built from them for every
/// attempt, so redirect policy and headers are per request, never shared.
#[derive(Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Overall transfer timeout; `None` leaves only the connect timeout.
    pub timeout: Option<Duration>,
    pub insecure_tls: bool,
    pub certificates_dir: Option<PathBuf>,
    pub client_cert_path: Option<PathBuf>,
    pub client_cert_key_path: Option<PathBuf>,
    pub customizer: Option<HandleCustomizer>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: None,
            insecure_tls: false,
            certificates_dir: None,
            client_cert_path: None,
            client_cert_key_path: None,
            customizer: None,
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .field("insecure_tls", &self.insecure_tls)
            .field("certificates_dir", &self.certificates_dir)
            .field("client_cert_path", &self.client_cert_path)
            .field("client_cert_key_path", &self.client_cert_key_path)
            .field("customizer", &self.customizer.is_some())
            .finish()
    }
}

impl TransportConfig {
    pub(crate) fn new_handle(&self) -> Result<Easy, curl::Error> {
        let mut easy = Easy::new();
        easy.connect_timeout(self.connect_timeout)?;
        if let Some(timeout) = self.timeout {
            easy.timeout(timeout)?;
        }
        if self.insecure_tls {
            easy.ssl_verify_peer(false)?;
            easy.ssl_verify_host(false)?;
        }
        if let Some(dir) = &self.certificates_dir {
            easy.capath(dir)?;
        }
        if let Some(cert) = &self.client_cert_path {
            easy.ssl_cert(cert)?;
            let key = self.client_cert_key_path.as_ref().unwrap_or(cert);
            easy.ssl_key(key)?;
        }
        if let Some(customize) = &self.customizer {
            customize(&mut easy)?;
        }
        Ok(easy)
    }
}
