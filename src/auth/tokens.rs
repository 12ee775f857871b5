//! JWT issuance and validation.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::UserId;
use crate::error::ServerError;

/// Access token lifetime.
pub const ACCESS_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime.
pub const REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Token purpose, carried in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer token.
    Access,
    /// Long-lived token exchanged for new access tokens.
    Refresh,
}

/// Signed claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject.
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// Username at issue time.
    pub username: String,
    /// Token purpose.
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// A freshly signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Signs and validates HS256 tokens with one shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a service with the default lifetimes.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttls(secret, ACCESS_TTL_SECS, REFRESH_TTL_SECS)
    }

    /// Creates a service with explicit lifetimes in seconds.
    #[must_use]
    pub fn with_ttls(secret: &[u8], access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Issues a token of `kind` for the given user.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Internal`] if signing fails.
    pub fn issue(
        &self,
        kind: TokenKind,
        user_id: UserId,
        username: &str,
    ) -> Result<IssuedToken, ServerError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl);
        let claims = Claims {
            user_id,
            username: username.to_string(),
            kind,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServerError::Internal(format!("token signing failed: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Validates an access token.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Unauthorized`] for bad signatures, expired
    /// tokens and refresh tokens.
    pub fn validate_access(&self, token: &str) -> Result<Claims, ServerError> {
        self.validate(token, TokenKind::Access)
    }

    /// Validates a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Unauthorized`] for bad signatures, expired
    /// tokens and access tokens.
    pub fn validate_refresh(&self, token: &str) -> Result<Claims, ServerError> {
        self.validate(token, TokenKind::Refresh)
    }

    fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims, ServerError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| ServerError::Unauthorized(format!("invalid token: {e}")))?;
        if data.claims.kind != expected {
            return Err(ServerError::Unauthorized("wrong token type".into()));
        }
        Ok(data.claims)
    }

    /// Digest under which refresh tokens are stored.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
