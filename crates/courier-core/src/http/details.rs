//! Per-request credential snapshot.

use std::collections::BTreeMap;
use std::fmt;

/// Credentials and extra headers attached to one request.
///
/// Created from the shared credential configuration and then owned by a single
/// request attempt; header refreshes mutate this copy, never the shared source.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientDetails {
    pub user: String,
    pub password: String,
    pub api_key: String,
    pub access_token: String,
    /// Header bag copied onto every request (e.g. an SSH `Authorization` header).
    pub headers: BTreeMap<String, String>,
}

impl ClientDetails {
    pub fn with_basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            ..Self::default()
        }
    }

    /// Set a header, replacing any existing one with the same (case-insensitive) name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy every entry of `headers` into this bag, overwriting same-named entries.
    pub fn merge_headers(&mut self, headers: &BTreeMap<String, String>) {
        for (k, v) in headers {
            self.set_header(k, v.clone());
        }
    }
}

fn redact(s: &str) -> &'static str {
    if s.is_empty() {
        ""
    } else {
        "***"
    }
}

impl fmt::Debug for ClientDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientDetails")
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("api_key", &redact(&self.api_key))
            .field("access_token", &redact(&self.access_token))
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}
