//! Credentials: JWT helpers, the shared service credential and the expiry
//! manager that refreshes it once for all concurrent requests.

mod credentials;
mod expiry;
mod token;

pub use credentials::ServiceDetails;
pub use expiry::{is_ssh_url, ExpiryManager, SshAuthenticator, SshLogin, TokenRefresher, SSH_REFRESH_WAIT};
pub use token::{
    extract_payload, token_expiry_seconds, token_minutes_left, username_from_token, Audience, TokenPayload,
    REFRESH_BEFORE_EXPIRY_MINUTES,
};
