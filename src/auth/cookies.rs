//! Refresh-token cookie handling.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

use super::tokens::REFRESH_TTL_SECS;

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Reads a cookie value from the request headers.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value storing a refresh token.
#[must_use]
pub fn refresh_cookie(token: &str) -> String {
    format!("{REFRESH_COOKIE}={token}; Max-Age={REFRESH_TTL_SECS}; Path=/; HttpOnly; Secure; SameSite=Lax")
}

/// `Set-Cookie` value clearing the refresh token.
#[must_use]
pub fn clear_refresh_cookie() -> String {
    format!("{REFRESH_COOKIE}=; Max-Age=0; Path=/; HttpOnly; Secure; SameSite=Lax")
}
