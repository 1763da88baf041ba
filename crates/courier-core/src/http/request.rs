//! Request descriptor.

use std::fmt;

/// Redirect hops followed (or replayed, for POST) before giving up.
pub const MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HTTP request. Built once, then executed (possibly several times) unchanged.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub body: Option<Vec<u8>>,
    /// Request-specific headers (e.g. `Range`), applied after client-details headers.
    pub headers: Vec<(String, String)>,
    pub follow_redirect: bool,
    /// Only a response with this status streams its body to the caller's sink;
    /// any other body is kept, truncated, in `Response::body`.
    pub expect_status: Option<u32>,
    /// POST redirects replayed so far.
    pub(crate) redirects: u32,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Vec::new(),
            follow_redirect: true,
            expect_status: None,
            redirects: 0,
        }
    }

    /// HEAD requests never carry a body; one given here is dropped.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        if self.method != Method::Head {
            self.body = Some(body.into());
        }
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn follow_redirect(mut self, follow: bool) -> Self {
        self.follow_redirect = follow;
        self
    }

    pub fn expect_status(mut self, status: u32) -> Self {
        self.expect_status = Some(status);
        self
    }

    pub fn content_length(&self) -> u64 {
        self.body.as_ref().map(|b| b.len() as u64).unwrap_or(0)
    }

    /// Whether curl may follow redirects itself. POST redirects are captured and
    /// replayed by the pipeline so the body is never dropped.
    pub(crate) fn auto_follow(&self) -> bool {
        self.follow_redirect && self.method != Method::Post
    }

    /// The same request aimed at a redirect target.
    pub(crate) fn redirected(&self, location: &str) -> Self {
        let mut next = self.clone();
        next.url = location.to_string();
        next.redirects += 1;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_drops_body() {
        let r = Request::new(Method::Head, "http://h/a").body(b"x".to_vec());
        assert!(r.body.is_none());
        assert_eq!(r.content_length(), 0);
    }

    #[test]
    fn post_is_never_auto_followed() {
        let r = Request::new(Method::Post, "http://h/a").body("abc");
        assert!(!r.auto_follow());
        assert_eq!(r.content_length(), 3);
        let g = Request::new(Method::Get, "http://h/a");
        assert!(g.auto_follow());
        assert!(!g.follow_redirect(false).auto_follow());
    }

    #[test]
    fn redirected_keeps_method_and_body() {
        let r = Request::new(Method::Post, "http://h/a").body("abc");
        let n = r.redirected("http://h/b");
        assert_eq!(n.method, Method::Post);
        assert_eq!(n.url, "http://h/b");
        assert_eq!(n.body.as_deref(), Some(&b"abc"[..]));
        assert_eq!(n.redirects, 1);
    }
}
