//! Account DTOs: registration, login, refresh and profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{UserId, UserRecord};
use crate::service::AuthSession;

/// Request body for `POST /api/auth/register`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Display name, trimmed.
    pub username: String,
    /// Email, trimmed and lowercased.
    pub email: String,
    /// At least six characters.
    pub password: String,
}

/// Request body for `POST /api/auth/login`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Registered email.
    pub email: String,
    /// Plain password.
    pub password: String,
}

/// Optional body for `POST /api/auth/refresh` when no cookie is sent.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Refresh token issued at login.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Request body for `PUT /api/auth/avatar`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvatarRequest {
    /// New avatar location.
    pub avatar_url: String,
}

/// Public profile of a player.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Lowercased email.
    pub email: String,
    /// Avatar location, if set.
    pub avatar_url: Option<String>,
    /// Current Elo rating.
    pub elo_rating: i32,
    /// Finished games.
    pub games_played: i32,
    /// Games won.
    pub wins: i32,
    /// Games lost.
    pub losses: i32,
    /// Games drawn.
    pub draws: i32,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserDto {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar_url: user.avatar_url,
            elo_rating: user.rating,
            games_played: user.games_played,
            wins: user.wins,
            losses: user.losses,
            draws: user.draws,
            created_at: user.created_at,
        }
    }
}

/// Response body for register and login.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Bearer token, valid for 15 minutes.
    pub access_token: String,
    /// Refresh token, valid for 7 days. Also set as an HTTP-only cookie.
    pub refresh_token: String,
    /// The signed-in user.
    pub user: UserDto,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            user: session.user.into(),
        }
    }
}

/// Response body for `POST /api/auth/refresh`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    /// Fresh bearer token.
    pub access_token: String,
}
