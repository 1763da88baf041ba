//! Access-token (JWT) payload helpers. Signatures are not verified; the
//! payload is only read to learn the subject and the expiry.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;

use crate::error::TransferError;

/// Refresh bearer tokens with fewer minutes left than this.
pub const REFRESH_BEFORE_EXPIRY_MINUTES: i64 = 10;

/// `aud` is either one string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenPayload {
    #[serde(default, rename = "sub")]
    pub subject: String,
    #[serde(default, rename = "scp")]
    pub scope: String,
    #[serde(default, rename = "iss")]
    pub issuer: String,
    #[serde(default, rename = "exp")]
    pub expiration_time: i64,
    #[serde(default, rename = "iat")]
    pub issued_at: i64,
    #[serde(default, rename = "jti")]
    pub jwt_id: String,
    #[serde(default, rename = "aud")]
    pub audience: Option<Audience>,
}

fn invalid(msg: impl Into<String>) -> anyhow::Error {
    TransferError::InvalidToken(msg.into()).into()
}

/// Decode the middle part of a `header.payload.signature` token.
pub fn extract_payload(token: &str) -> Result<TokenPayload> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(invalid("received invalid access-token"));
    }
    let encoded = parts[1].trim_end_matches('=');
    let raw = URL_SAFE_NO_PAD
        .decode(encoded)
        .or_else(|_| STANDARD_NO_PAD.decode(encoded))
        .map_err(|e| invalid(format!("payload is not base64: {}", e)))?;
    serde_json::from_slice(&raw)
        .map_err(|e| invalid(format!("failed extracting payload from the provided access-token: {}", e)))
}

/// User name: the part of the subject after its last `/`.
pub fn username_from_token(token: &str) -> Result<String> {
    let payload = extract_payload(token)?;
    if payload.subject.is_empty() {
        return Err(invalid("could not extract subject from the provided access-token"));
    }
    match payload.subject.rfind('/') {
        Some(i) => Ok(payload.subject[i + 1..].to_string()),
        None => Err(invalid(format!(
            "could not extract username from access-token's subject: {}",
            payload.subject
        ))),
    }
}

/// Lifetime the token was issued with, in seconds (`exp - iat`).
pub fn token_expiry_seconds(token: &str) -> Result<i64> {
    let payload = extract_payload(token)?;
    Ok(payload.expiration_time - payload.issued_at)
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Whole minutes until the token expires; 0 once expired.
pub fn token_minutes_left(token: &str) -> Result<i64> {
    minutes_left_at(token, now_unix())
}

pub(crate) fn minutes_left_at(token: &str, now: i64) -> Result<i64> {
    let payload = extract_payload(token)?;
    let left = payload.expiration_time - now;
    Ok(if left < 0 { 0 } else { left / 60 })
}

#[cfg(test)]
pub(crate) fn make_token(payload: &serde_json::Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        "sig"
    )
}
