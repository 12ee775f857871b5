//! Game handlers: create, list, get, join, history and PGN export.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CreateGameRequest, GameDto, MoveDto};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::GameId;
use crate::error::{ErrorResponse, ServerError};

/// Media type of exported games.
pub const PGN_CONTENT_TYPE: &str = "application/x-chess-pgn";

/// `POST /api/games` — Create a waiting game with the caller as white.
///
/// # Errors
///
/// Returns [`ServerError::InvalidRequest`] for a malformed body.
#[utoipa::path(
    post,
    path = "/api/games",
    tag = "Games",
    summary = "Create a game",
    description = "Creates a waiting game seated with the caller as white. The body is optional; `timeControl` defaults to 600 seconds.",
    security(("bearer" = [])),
    request_body(content = CreateGameRequest, description = "Optional time control"),
    responses(
        (status = 201, description = "Game created", body = GameDto),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn create_game(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        CreateGameRequest::default()
    } else {
        serde_json::from_slice::<CreateGameRequest>(&body)
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?
    };
    let game = state
        .games
        .create_game(user.user_id, req.time_control.unwrap_or(0))
        .await?;
    Ok((StatusCode::CREATED, Json(GameDto::from(game))))
}

/// `GET /api/games` — Games the caller plays in, newest first.
///
/// # Errors
///
/// Returns [`ServerError::Storage`] on database failure.
#[utoipa::path(
    get,
    path = "/api/games",
    tag = "Games",
    summary = "List my games",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Games, newest first", body = Vec<GameDto>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn list_games(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServerError> {
    let games: Vec<GameDto> = state
        .games
        .list_user_games(user.user_id)
        .await?
        .into_iter()
        .map(GameDto::from)
        .collect();
    Ok(Json(games))
}

/// `GET /api/games/{id}` — A game with both player profiles.
///
/// # Errors
///
/// Returns [`ServerError::GameNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/games/{id}",
    tag = "Games",
    summary = "Get a game",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game with players", body = GameDto),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn get_game(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<GameId>,
) -> Result<impl IntoResponse, ServerError> {
    let view = state.games.get_game(id).await?;
    Ok(Json(GameDto::from(view)))
}

/// `POST /api/games/{id}/join` — Take the black seat of a waiting game.
///
/// # Errors
///
/// Returns [`ServerError::GameNotJoinable`] for self-joins and games that
/// are no longer waiting.
#[utoipa::path(
    post,
    path = "/api/games/{id}/join",
    tag = "Games",
    summary = "Join a game",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game is now active", body = GameDto),
        (status = 400, description = "Game not joinable", body = ErrorResponse),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn join_game(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<GameId>,
) -> Result<impl IntoResponse, ServerError> {
    state.games.join_game(id, user.user_id).await?;
    let view = state.games.get_game(id).await?;
    Ok(Json(GameDto::from(view)))
}

/// `GET /api/games/{id}/history` — Moves in ply order.
///
/// # Errors
///
/// Returns [`ServerError::GameNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/games/{id}/history",
    tag = "Games",
    summary = "Move history",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Moves, ply ascending", body = Vec<MoveDto>),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn game_history(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<GameId>,
) -> Result<impl IntoResponse, ServerError> {
    let moves: Vec<MoveDto> = state
        .games
        .list_game_history(id)
        .await?
        .into_iter()
        .map(MoveDto::from)
        .collect();
    Ok(Json(moves))
}

/// `GET /api/games/{id}/pgn` — Export the game as PGN.
///
/// # Errors
///
/// Returns [`ServerError::GameNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/games/{id}/pgn",
    tag = "Games",
    summary = "Export PGN",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "PGN document", body = String, content_type = "application/x-chess-pgn"),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn export_pgn(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<GameId>,
) -> Result<impl IntoResponse, ServerError> {
    let pgn = state.games.export_pgn(id).await?;
    Ok(([(CONTENT_TYPE, PGN_CONTENT_TYPE)], pgn))
}

/// Game routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/games", post(create_game).get(list_games))
        .route("/api/games/{id}", get(get_game))
        .route("/api/games/{id}/join", post(join_game))
        .route("/api/games/{id}/history", get(game_history))
        .route("/api/games/{id}/pgn", get(export_pgn))
}
