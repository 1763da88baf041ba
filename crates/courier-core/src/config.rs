use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Global configuration loaded from `~/.config/courier/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Retries after the first attempt (0 = no retries).
    pub retries: u32,
    /// Wait between attempts in milliseconds (0 = built-in default).
    pub retry_interval_ms: u64,
    pub connect_timeout_secs: u64,
    /// Overall per-request timeout; unset means none.
    pub request_timeout_secs: Option<u64>,
    /// Concurrent range requests per chunked download.
    pub split_count: usize,
    /// Files smaller than this are downloaded in a single stream.
    pub min_split_size: u64,
    /// Skip TLS peer and host verification.
    pub insecure_tls: bool,
    /// Directory of extra trusted CA certificates.
    pub certificates_dir: Option<PathBuf>,
    pub client_cert_path: Option<PathBuf>,
    pub client_cert_key_path: Option<PathBuf>,
    /// Bearer tokens with fewer minutes left are refreshed before use.
    pub refresh_before_expiry_minutes: u64,
    /// Pause before re-authenticating an SSH header, letting in-flight requests finish.
    pub ssh_refresh_wait_secs: u64,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_interval_ms: 0,
            connect_timeout_secs: 30,
            request_timeout_secs: None,
            split_count: 3,
            min_split_size: 5 * 1024 * 1024,
            insecure_tls: false,
            certificates_dir: None,
            client_cert_path: None,
            client_cert_key_path: None,
            refresh_before_expiry_minutes: 10,
            ssh_refresh_wait_secs: 15,
        }
    }
}

impl CourierConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let interval_ms = if self.retry_interval_ms == 0 {
            RetryPolicy::default().interval_ms
        } else {
            self.retry_interval_ms
        };
        RetryPolicy::new(self.retries, interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn ssh_refresh_wait(&self) -> Duration {
        Duration::from_secs(self.ssh_refresh_wait_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("courier")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CourierConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<CourierConfig> {
    if !path.exists() {
        let default_cfg = CourierConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: CourierConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = CourierConfig::default();
        assert_eq!(cfg.retries, 3);
        assert_eq!(cfg.split_count, 3);
        assert_eq!(cfg.min_split_size, 5 * 1024 * 1024);
        assert_eq!(cfg.refresh_before_expiry_minutes, 10);
        assert_eq!(cfg.ssh_refresh_wait(), Duration::from_secs(15));
        assert_eq!(cfg.retry_policy(), RetryPolicy::new(3, 1000));
        assert!(cfg.request_timeout().is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = CourierConfig {
            request_timeout_secs: Some(600),
            certificates_dir: Some(PathBuf::from("/etc/courier/certs")),
            ..CourierConfig::default()
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: CourierConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_uses_defaults() {
        let toml = r#"
            retries = 0
            retry_interval_ms = 250
            insecure_tls = true
        "#;
        let cfg: CourierConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.retry_policy(), RetryPolicy::new(0, 250));
        assert!(cfg.insecure_tls);
        assert_eq!(cfg.split_count, 3);
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn load_or_init_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert_eq!(cfg, CourierConfig::default());
        assert!(path.exists());
        std::fs::write(&path, "split_count = 8\n").unwrap();
        assert_eq!(load_or_init_at(&path).unwrap().split_count, 8);
    }
}
