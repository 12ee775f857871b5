//! Matchmaking handlers: find, cancel and status.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{FindMatchResponse, GameDto, MessageResponse, QueueStatusResponse};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ErrorResponse, ServerError};
use crate::service::EnqueueOutcome;

/// `POST /api/matchmaking/find` — Enqueue at the caller's rating or pair
/// immediately.
///
/// # Errors
///
/// Returns [`ServerError`] if the caller's profile cannot be loaded or the
/// paired game cannot be created.
#[utoipa::path(
    post,
    path = "/api/matchmaking/find",
    tag = "Matchmaking",
    summary = "Find a match",
    description = "Pairs the caller with the longest-waiting player within the rating band, or queues them. Repeating the call while queued only refreshes the stored rating.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Paired or queued", body = FindMatchResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn find_match(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServerError> {
    let profile = state.auth.profile(user.user_id).await?;
    let response = match state.matchmaking.enqueue(profile.id, profile.rating).await? {
        EnqueueOutcome::Paired(view) => FindMatchResponse {
            matched: true,
            game: Some(GameDto::from(view)),
            position: None,
            message: None,
        },
        EnqueueOutcome::Waiting { position } => FindMatchResponse {
            matched: false,
            game: None,
            position: Some(position),
            message: Some("Searching for opponent...".to_string()),
        },
    };
    Ok(Json(response))
}

/// `POST /api/matchmaking/cancel` — Leave the queue. No-op if not queued.
#[utoipa::path(
    post,
    path = "/api/matchmaking/cancel",
    tag = "Matchmaking",
    summary = "Cancel matchmaking",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller is no longer queued", body = MessageResponse),
    )
)]
pub async fn cancel_match(State(state): State<AppState>, user: AuthUser) -> impl IntoResponse {
    state.matchmaking.dequeue(user.user_id).await;
    Json(MessageResponse::new("Matchmaking cancelled"))
}

/// `GET /api/matchmaking/status` — Queue position of the caller.
#[utoipa::path(
    get,
    path = "/api/matchmaking/status",
    tag = "Matchmaking",
    summary = "Queue status",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Queue membership", body = QueueStatusResponse),
    )
)]
pub async fn queue_status(State(state): State<AppState>, user: AuthUser) -> impl IntoResponse {
    let position = state.matchmaking.position(user.user_id).await;
    Json(QueueStatusResponse {
        in_queue: position.is_some(),
        position,
    })
}

/// Matchmaking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/matchmaking/find", post(find_match))
        .route("/api/matchmaking/cancel", post(cancel_match))
        .route("/api/matchmaking/status", get(queue_status))
}
