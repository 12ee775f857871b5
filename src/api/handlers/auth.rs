//! Account handlers: register, login, refresh, logout, profile, avatar.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    AccessTokenResponse, AuthResponse, AvatarRequest, LoginRequest, MessageResponse,
    RefreshRequest, RegisterRequest, UserDto,
};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::auth::cookies::{REFRESH_COOKIE, clear_refresh_cookie, read_cookie, refresh_cookie};
use crate::error::{ErrorResponse, ServerError};

/// `POST /api/auth/register` — Create an account and sign in.
///
/// # Errors
///
/// Returns [`ServerError`] on invalid input or a taken username/email.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    summary = "Register",
    description = "Creates a user with rating 1200 and returns an access token, a refresh token and the profile. The refresh token is also set as an HTTP-only cookie.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = AuthResponse),
        (status = 400, description = "Missing field or short password", body = ErrorResponse),
        (status = 409, description = "Username or email taken", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let session = state
        .auth
        .register(&req.username, &req.email, &req.password)
        .await?;
    let cookie = refresh_cookie(&session.refresh_token);
    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse::from(session)),
    ))
}

/// `POST /api/auth/login` — Sign in with email and password.
///
/// # Errors
///
/// Returns [`ServerError::InvalidCredentials`] on a bad email/password pair.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let session = state.auth.login(&req.email, &req.password).await?;
    let cookie = refresh_cookie(&session.refresh_token);
    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse::from(session)),
    ))
}

/// `POST /api/auth/refresh` — Exchange a refresh token for an access token.
///
/// The token is read from the `refresh_token` cookie, falling back to a
/// `{"refreshToken": ...}` body.
///
/// # Errors
///
/// Returns [`ServerError::Unauthorized`] if no token is supplied or it is
/// invalid, revoked or expired.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    summary = "Refresh access token",
    request_body(content = RefreshRequest, description = "Used when no refresh cookie is sent"),
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Missing, invalid or revoked refresh token", body = ErrorResponse),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let token = refresh_token(&headers, &body)
        .ok_or_else(|| ServerError::Unauthorized("refresh token required".into()))?;
    let access_token = state.auth.refresh(&token).await?;
    Ok(Json(AccessTokenResponse { access_token }))
}

/// `POST /api/auth/logout` — Revoke the refresh token and clear its cookie.
///
/// # Errors
///
/// Returns [`ServerError::Storage`] on database failure.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    summary = "Log out",
    request_body(content = RefreshRequest, description = "Used when no refresh cookie is sent"),
    responses(
        (status = 200, description = "Refresh token revoked", body = MessageResponse),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    if let Some(token) = refresh_token(&headers, &body) {
        state.auth.logout(&token).await?;
    }
    Ok((
        [(SET_COOKIE, clear_refresh_cookie())],
        Json(MessageResponse::new("Logged out")),
    ))
}

/// `GET /api/auth/me` — Current user profile.
///
/// # Errors
///
/// Returns [`ServerError`] for a missing token or a deleted user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    summary = "Current user",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile", body = UserDto),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServerError> {
    let profile = state.auth.profile(user.user_id).await?;
    Ok(Json(UserDto::from(profile)))
}

/// `PUT /api/auth/avatar` — Replace the avatar URL.
///
/// # Errors
///
/// Returns [`ServerError::InvalidRequest`] for an empty URL.
#[utoipa::path(
    put,
    path = "/api/auth/avatar",
    tag = "Auth",
    summary = "Update avatar",
    security(("bearer" = [])),
    request_body = AvatarRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserDto),
        (status = 400, description = "Empty avatar URL", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn update_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AvatarRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let profile = state
        .auth
        .update_avatar(user.user_id, &req.avatar_url)
        .await?;
    Ok(Json(UserDto::from(profile)))
}

/// Cookie first, then an optional JSON body.
fn refresh_token(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    read_cookie(headers, REFRESH_COOKIE).or_else(|| {
        serde_json::from_slice::<RefreshRequest>(body)
            .ok()
            .and_then(|req| req.refresh_token)
            .filter(|token| !token.trim().is_empty())
    })
}

/// Account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/auth/avatar", put(update_avatar))
}
