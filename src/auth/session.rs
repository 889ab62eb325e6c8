//! Session cookie helpers.
//!
//! The JWT issued at login travels in an `HttpOnly` cookie:
//! `session_token=<jwt>; HttpOnly; Path=/; Max-Age=<secs>; SameSite=...`
//!
//! When the server is reached over HTTPS the frontend usually lives on another
//! origin, so the cookie is sent as `SameSite=None; Secure`. Plain-HTTP setups
//! (local development) fall back to `SameSite=Lax` without `Secure`.

use anyhow::{Context, Result};
use axum::http::{header, HeaderMap, HeaderValue};

/// Cookie name for the session JWT
pub const SESSION_COOKIE_NAME: &str = "session_token";

fn same_site_flags(is_secure: bool) -> &'static str {
    if is_secure {
        "SameSite=None; Secure"
    } else {
        "SameSite=Lax"
    }
}

/// Build the `Set-Cookie` header value carrying the session token.
pub fn build_session_cookie(
    token: &str,
    max_age_secs: u64,
    is_secure: bool,
) -> Result<HeaderValue> {
    let cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; {}",
        SESSION_COOKIE_NAME,
        token,
        max_age_secs,
        same_site_flags(is_secure)
    );
    HeaderValue::from_str(&cookie).context("Session token is not a valid cookie value")
}

/// Build a `Set-Cookie` header that deletes the session cookie.
pub fn build_clear_cookie(is_secure: bool) -> HeaderValue {
    if is_secure {
        HeaderValue::from_static(
            "session_token=; HttpOnly; Path=/; Max-Age=0; SameSite=None; Secure",
        )
    } else {
        HeaderValue::from_static("session_token=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax")
    }
}

/// Extract the session token from a `Cookie` header value.
pub fn extract_session_token_from_cookie(cookie_header: &str) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE_NAME);
    cookie_header
        .split(';')
        .filter_map(|part| part.trim().strip_prefix(prefix.as_str()))
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(String::from)
}

/// Find the session credential on a request: the cookie first, then
/// `Authorization: Bearer <jwt>`.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(extract_session_token_from_cookie);
    if from_cookie.is_some() {
        return from_cookie;
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Whether cookies should carry the `Secure` flag.
pub fn should_set_secure(public_url: Option<&str>) -> bool {
    public_url.is_some_and(|url| url.starts_with("https://"))
}
