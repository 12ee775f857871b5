//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;

use super::connection::run_session;
use super::messages::ServerFrame;
use crate::app_state::AppState;
use crate::domain::GameId;
use crate::error::ServerError;

/// Query string of the session endpoint. Browsers cannot attach headers to
/// the upgrade request, so the access token travels here.
#[derive(Debug, Default, Deserialize)]
pub struct SessionParams {
    /// Access token.
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /api/ws/games/{id}?token=...` — Open a duplex session on a game.
///
/// Authentication, lookup and membership are checked before the upgrade so
/// that rejections surface as plain HTTP statuses.
///
/// # Errors
///
/// Returns [`ServerError::Unauthorized`] (401) for a missing or invalid
/// token, [`ServerError::GameNotFound`] (404) for an unknown game and
/// [`ServerError::NotAParticipant`] (403) when the caller holds no seat.
pub async fn session_handler(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
    Query(params): Query<SessionParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    let token = params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServerError::Unauthorized("missing token query parameter".into()))?;
    let claims = state.tokens.validate_access(token).inspect_err(|e| {
        tracing::warn!(%game_id, error = %e, "session rejected");
    })?;
    let view = state.games.get_game(game_id).await?;
    let Some(color) = view.game.color_of(claims.user_id) else {
        tracing::warn!(%game_id, user_id = %claims.user_id, "session rejected: not a participant");
        return Err(ServerError::NotAParticipant);
    };

    let snapshot = ServerFrame::snapshot(&view.game, color);
    let user_id = claims.user_id;
    Ok(ws.on_upgrade(move |socket| run_session(socket, state, game_id, user_id, snapshot)))
}
