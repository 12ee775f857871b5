//! Bearer-token extractor for authenticated handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::ServerError;

/// Identity of the caller, taken from a valid `Authorization: Bearer` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Authenticated user.
    pub user_id: UserId,
    /// Username claimed by the token.
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServerError::Unauthorized("missing authorization header".into()))?;
        let token = bearer_token(header)
            .ok_or_else(|| ServerError::Unauthorized("expected a bearer token".into()))?;
        let claims = state.tokens.validate_access(token)?;
        Ok(Self {
            user_id: claims.user_id,
            username: claims.username,
        })
    }
}

/// Extracts the token from a `Bearer <token>` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
