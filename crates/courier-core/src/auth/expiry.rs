//! Single-flight credential refresh shared by concurrent requests.
//!
//! One `ExpiryManager` belongs to one credential configuration. Requests
//! work on their own `ClientDetails` copy; the manager holds the
//! authoritative token and SSH headers behind a mutex and copies them into
//! the caller's details once a refresh (by whichever thread won) is done.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};

use super::token::{token_minutes_left, REFRESH_BEFORE_EXPIRY_MINUTES};
use crate::http::ClientDetails;

/// Pause before re-authenticating an expired SSH header.
pub const SSH_REFRESH_WAIT: Duration = Duration::from_secs(15);

/// Exchanges a stale access token for a fresh one. An empty result means
/// "no new token".
pub type TokenRefresher = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Headers and HTTP base URL obtained by logging in over SSH.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshLogin {
    pub headers: BTreeMap<String, String>,
    pub base_url: String,
}

/// Performs the SSH login; the protocol itself is up to the implementation.
pub trait SshAuthenticator: Send + Sync {
    fn authenticate(&self, ssh_url: &str) -> Result<SshLogin>;
}

#[derive(Debug, Clone, Default)]
struct ExpiryState {
    access_token: String,
    ssh_headers: BTreeMap<String, String>,
    /// Service URL; replaced by the base URL an SSH login returns.
    url: String,
}

pub struct ExpiryManager {
    state: Mutex<ExpiryState>,
    ssh_url: Option<String>,
    refresher: Option<TokenRefresher>,
    ssh: Option<Arc<dyn SshAuthenticator>>,
    refresh_before_expiry_minutes: i64,
    ssh_refresh_wait: Duration,
}

impl fmt::Debug for ExpiryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryManager")
            .field("ssh_url", &self.ssh_url)
            .field("refresher", &self.refresher.is_some())
            .field("ssh", &self.ssh.is_some())
            .field("refresh_before_expiry_minutes", &self.refresh_before_expiry_minutes)
            .field("ssh_refresh_wait", &self.ssh_refresh_wait)
            .finish()
    }
}

/// True for `ssh://` URLs.
pub fn is_ssh_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| u.scheme() == "ssh")
        .unwrap_or(false)
}

impl ExpiryManager {
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        let url = url.into();
        let ssh_url = is_ssh_url(&url).then(|| url.clone());
        Self {
            state: Mutex::new(ExpiryState {
                access_token: access_token.into(),
                ssh_headers: BTreeMap::new(),
                url,
            }),
            ssh_url,
            refresher: None,
            ssh: None,
            refresh_before_expiry_minutes: REFRESH_BEFORE_EXPIRY_MINUTES,
            ssh_refresh_wait: SSH_REFRESH_WAIT,
        }
    }

    pub fn refresher(mut self, refresher: TokenRefresher) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Authenticate over SSH at `ssh_url` (defaults to the service URL when it is `ssh://`).
    pub fn ssh_authenticator(mut self, ssh: Arc<dyn SshAuthenticator>, ssh_url: Option<String>) -> Self {
        if ssh_url.is_some() {
            self.ssh_url = ssh_url;
        }
        self.ssh = Some(ssh);
        self
    }

    pub fn refresh_before_expiry_minutes(mut self, minutes: i64) -> Self {
        self.refresh_before_expiry_minutes = minutes;
        self
    }

    pub fn ssh_refresh_wait(mut self, wait: Duration) -> Self {
        self.ssh_refresh_wait = wait;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ExpiryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn access_token(&self) -> String {
        self.lock().access_token.clone()
    }

    /// Replace the shared token, e.g. after an explicit login.
    pub fn set_access_token(&self, token: impl Into<String>) {
        self.lock().access_token = token.into();
    }

    pub fn ssh_headers(&self) -> BTreeMap<String, String> {
        self.lock().ssh_headers.clone()
    }

    pub fn url(&self) -> String {
        self.lock().url.clone()
    }

    pub fn is_ssh_authentication(&self) -> bool {
        self.ssh_url.is_some()
    }

    /// Log in over SSH now, installing the returned headers and base URL.
    pub fn authenticate_ssh(&self) -> Result<()> {
        let mut state = self.lock();
        self.login_ssh(&mut state)
    }

    fn login_ssh(&self, state: &mut ExpiryState) -> Result<()> {
        let (Some(ssh), Some(ssh_url)) = (self.ssh.as_ref(), self.ssh_url.as_deref()) else {
            anyhow::bail!("SSH authentication is not configured");
        };
        let login = ssh
            .authenticate(ssh_url)
            .with_context(|| format!("SSH authentication to {}", ssh_url))?;
        state.ssh_headers = login.headers;
        if !login.base_url.is_empty() {
            state.url = login.base_url;
        }
        Ok(())
    }

    /// Refresh the bearer token before use when it is close to expiry.
    ///
    /// The caller's `details.access_token` is the token it observed. If it
    /// still matches the shared token once the lock is held, this caller runs
    /// the refresh; otherwise another thread already did. Either way the
    /// current shared token ends up in `details`.
    pub fn handle_token_expiry(&self, details: &mut ClientDetails) -> Result<()> {
        let Some(refresher) = self.refresher.as_ref() else {
            return Ok(());
        };
        if details.access_token.is_empty() {
            return Ok(());
        }
        let minutes_left = token_minutes_left(&details.access_token)?;
        if minutes_left > self.refresh_before_expiry_minutes {
            return Ok(());
        }
        tracing::debug!("access token expires in {} minutes, refreshing", minutes_left);
        self.refresh_token(refresher, details)
    }

    fn refresh_token(&self, refresher: &TokenRefresher, details: &mut ClientDetails) -> Result<()> {
        let mut state = self.lock();
        if state.access_token == details.access_token {
            let fresh = refresher(&details.access_token).context("refresh access token")?;
            if !fresh.is_empty() && fresh != state.access_token {
                state.access_token = fresh;
                tracing::info!("access token refreshed");
            }
        }
        details.access_token = state.access_token.clone();
        Ok(())
    }

    /// Header-based SSH path, run after a 401.
    ///
    /// The thread that still sees its own `Authorization` header as the shared
    /// one waits `ssh_refresh_wait` for in-flight requests, then logs in again.
    /// The shared headers are then merged into `details`.
    pub fn handle_ssh_token_expiry(&self, details: &mut ClientDetails) -> Result<()> {
        {
            let mut state = self.lock();
            if state.ssh_headers.get("Authorization").map(String::as_str) == details.header("Authorization") {
                if !self.ssh_refresh_wait.is_zero() {
                    tracing::debug!("waiting {:?} before SSH re-authentication", self.ssh_refresh_wait);
                    std::thread::sleep(self.ssh_refresh_wait);
                }
                self.login_ssh(&mut state)?;
                tracing::info!("SSH token refreshed");
            }
        }
        details.merge_headers(&self.ssh_headers());
        Ok(())
    }

    /// React to a response status. Returns true when credentials were
    /// refreshed and the request is worth sending again.
    pub fn handle_expiry_status(&self, status: u32, details: &mut ClientDetails) -> Result<bool> {
        if status != 401 {
            return Ok(false);
        }
        if self.is_ssh_authentication() && self.ssh.is_some() {
            self.handle_ssh_token_expiry(details)?;
            return Ok(true);
        }
        if let Some(refresher) = self.refresher.as_ref() {
            if !details.access_token.is_empty() {
                let stale = details.access_token.clone();
                self.refresh_token(refresher, details)?;
                return Ok(details.access_token != stale);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::make_token;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn expiring_token(minutes: i64, id: &str) -> String {
        let exp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
            + minutes * 60
            + 30;
        make_token(&json!({"sub": "a/b", "exp": exp, "jti": id}))
    }

    fn counting_refresher(calls: &Arc<AtomicUsize>, fresh: String) -> TokenRefresher {
        let calls = Arc::clone(calls);
        Arc::new(move |_stale: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(fresh.clone())
        })
    }

    #[test]
    fn is_ssh_url_checks_scheme() {
        assert!(is_ssh_url("ssh://host:1339/"));
        assert!(is_ssh_url("SSH://host"));
        assert!(!is_ssh_url("https://host/artifactory"));
        assert!(!is_ssh_url("not a url"));
    }

    #[test]
    fn fresh_token_is_left_alone() {
        let calls = Arc::new(AtomicUsize::new(0));
        let token = expiring_token(60, "old");
        let mgr = ExpiryManager::new("https://h", token.clone())
            .refresher(counting_refresher(&calls, "new".into()));
        let mut details = ClientDetails::with_access_token(token.clone());
        mgr.handle_token_expiry(&mut details).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(details.access_token, token);
    }

    #[test]
    fn concurrent_callers_refresh_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stale = expiring_token(2, "old");
        let fresh = expiring_token(120, "new");
        let mgr = ExpiryManager::new("https://h", stale.clone())
            .refresher(counting_refresher(&calls, fresh.clone()));
        let barrier = Barrier::new(8);
        let seen: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let mut details = ClientDetails::with_access_token(stale.clone());
                        barrier.wait();
                        mgr.handle_token_expiry(&mut details).unwrap();
                        details.access_token
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen.iter().all(|t| *t == fresh));
        assert_eq!(mgr.access_token(), fresh);
    }

    #[test]
    fn empty_refresh_keeps_current_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stale = expiring_token(1, "old");
        let mgr = ExpiryManager::new("https://h", stale.clone())
            .refresher(counting_refresher(&calls, String::new()));
        let mut details = ClientDetails::with_access_token(stale.clone());
        mgr.handle_token_expiry(&mut details).unwrap();
        assert_eq!(details.access_token, stale);
    }

    #[test]
    fn undecodable_token_is_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mgr = ExpiryManager::new("https://h", "opaque")
            .refresher(counting_refresher(&calls, "new".into()));
        let mut details = ClientDetails::with_access_token("opaque");
        assert!(mgr.handle_token_expiry(&mut details).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct CountingSsh {
        calls: AtomicUsize,
    }

    impl SshAuthenticator for CountingSsh {
        fn authenticate(&self, _ssh_url: &str) -> Result<SshLogin> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut headers = BTreeMap::new();
            headers.insert("Authorization".to_string(), format!("Bearer ssh-{}", n));
            Ok(SshLogin {
                headers,
                base_url: "https://h/artifactory/".into(),
            })
        }
    }

    #[test]
    fn ssh_expiry_reauthenticates_once_and_merges_headers() {
        let ssh = Arc::new(CountingSsh {
            calls: AtomicUsize::new(0),
        });
        let mgr = ExpiryManager::new("ssh://h:1339", "")
            .ssh_authenticator(ssh.clone(), None)
            .ssh_refresh_wait(Duration::ZERO);
        mgr.authenticate_ssh().unwrap();
        assert_eq!(mgr.url(), "https://h/artifactory/");

        let mut a = ClientDetails::default();
        a.merge_headers(&mgr.ssh_headers());
        let mut b = a.clone();

        assert!(mgr.handle_expiry_status(401, &mut a).unwrap());
        assert!(mgr.handle_expiry_status(401, &mut b).unwrap());
        assert_eq!(ssh.calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.header("Authorization"), Some("Bearer ssh-2"));
        assert_eq!(b.header("Authorization"), Some("Bearer ssh-2"));
        assert!(!mgr.handle_expiry_status(404, &mut a).unwrap());
    }

    #[test]
    fn unauthorized_bearer_refreshes_reactively() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mgr = ExpiryManager::new("https://h", "t1").refresher(counting_refresher(&calls, "t2".into()));
        let mut details = ClientDetails::with_access_token("t1");
        assert!(mgr.handle_expiry_status(401, &mut details).unwrap());
        assert_eq!(details.access_token, "t2");
        let mut late = ClientDetails::with_access_token("t1");
        assert!(mgr.handle_expiry_status(401, &mut late).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
