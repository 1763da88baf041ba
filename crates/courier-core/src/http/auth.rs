//! Authentication and header assembly for outgoing requests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::details::ClientDetails;

/// Header carrying an API key when no user name is configured.
pub const DEFAULT_API_KEY_HEADER: &str = "X-JFrog-Art-Api";

pub const USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

fn basic(user: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, secret)))
}

/// Authentication header for `details`, by precedence: API key, access token, password.
pub fn auth_header(details: &ClientDetails, api_key_header: &str) -> Option<(String, String)> {
    if !details.api_key.is_empty() {
        if !details.user.is_empty() {
            return Some(("Authorization".into(), basic(&details.user, &details.api_key)));
        }
        return Some((api_key_header.to_string(), details.api_key.clone()));
    }
    if !details.access_token.is_empty() {
        if !details.user.is_empty() {
            return Some(("Authorization".into(), basic(&details.user, &details.access_token)));
        }
        return Some((
            "Authorization".into(),
            format!("Bearer {}", details.access_token),
        ));
    }
    if !details.password.is_empty() {
        return Some(("Authorization".into(), basic(&details.user, &details.password)));
    }
    None
}

/// Set `name: value`, replacing a header of the same name. Never removes other headers.
pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(slot) => slot.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// Full header list for one request: authentication, user agent, the details'
/// header bag, then request-specific headers. Later entries win on name clashes.
pub fn request_headers(
    details: &ClientDetails,
    api_key_header: &str,
    user_agent: &str,
    extra: &[(String, String)],
) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if let Some((name, value)) = auth_header(details, api_key_header) {
        set_header(&mut headers, &name, &value);
    }
    set_header(&mut headers, "User-Agent", user_agent);
    for (k, v) in &details.headers {
        set_header(&mut headers, k, v);
    }
    for (k, v) in extra {
        set_header(&mut headers, k, v);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(h: &'a [(String, String)], name: &str) -> Option<&'a str> {
        h.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn api_key_beats_token_and_password() {
        let d = ClientDetails {
            api_key: "key".into(),
            access_token: "tok".into(),
            password: "pw".into(),
            ..Default::default()
        };
        assert_eq!(
            auth_header(&d, DEFAULT_API_KEY_HEADER),
            Some((DEFAULT_API_KEY_HEADER.to_string(), "key".to_string()))
        );
    }

    #[test]
    fn api_key_with_user_is_basic() {
        let d = ClientDetails {
            user: "u".into(),
            api_key: "key".into(),
            ..Default::default()
        };
        let (name, value) = auth_header(&d, DEFAULT_API_KEY_HEADER).unwrap();
        assert_eq!(name, "Authorization");
        assert_eq!(value, format!("Basic {}", STANDARD.encode("u:key")));
    }

    #[test]
    fn token_without_user_is_bearer() {
        let d = ClientDetails::with_access_token("tok");
        assert_eq!(
            auth_header(&d, DEFAULT_API_KEY_HEADER).unwrap().1,
            "Bearer tok"
        );
        let d = ClientDetails {
            user: "u".into(),
            access_token: "tok".into(),
            ..Default::default()
        };
        assert_eq!(
            auth_header(&d, DEFAULT_API_KEY_HEADER).unwrap().1,
            format!("Basic {}", STANDARD.encode("u:tok"))
        );
    }

    #[test]
    fn password_is_basic_and_nothing_means_no_header() {
        let d = ClientDetails::with_basic("admin", "password");
        assert_eq!(
            auth_header(&d, DEFAULT_API_KEY_HEADER).unwrap().1,
            "Basic YWRtaW46cGFzc3dvcmQ="
        );
        assert!(auth_header(&ClientDetails::default(), DEFAULT_API_KEY_HEADER).is_none());
    }

    #[test]
    fn header_bag_overrides_auth_and_extra_overrides_bag() {
        let mut d = ClientDetails::with_basic("admin", "password");
        d.set_header("Authorization", "Bearer ssh-token");
        d.set_header("X-Trace", "1");
        let extra = vec![("x-trace".to_string(), "2".to_string())];
        let h = request_headers(&d, DEFAULT_API_KEY_HEADER, USER_AGENT, &extra);
        assert_eq!(find(&h, "authorization"), Some("Bearer ssh-token"));
        assert_eq!(find(&h, "X-Trace"), Some("2"));
        assert_eq!(find(&h, "User-Agent"), Some(USER_AGENT));
        assert_eq!(h.len(), 3);
    }
}
