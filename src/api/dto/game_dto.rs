//! Game and move DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::auth_dto::UserDto;
use crate::domain::{
    GameId, GameRecord, GameResult, GameStatus, GameView, MoveId, MoveRecord, UserId,
};

/// Optional body for `POST /api/games`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Seconds per player. Missing or non-positive means 600.
    #[serde(default)]
    pub time_control: Option<i32>,
}

/// A game as returned by the REST API.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameDto {
    /// Game identifier.
    pub id: GameId,
    /// White seat.
    pub white_player_id: Option<UserId>,
    /// Black seat, unset while waiting.
    pub black_player_id: Option<UserId>,
    /// Lifecycle stage.
    pub status: GameStatus,
    /// Outcome, `none` until finished.
    pub result: GameResult,
    /// Authoritative position.
    #[serde(rename = "currentFEN")]
    pub current_fen: String,
    /// PGN movetext so far.
    pub pgn: String,
    /// Configured seconds per player.
    pub time_control: i32,
    /// Stored seconds left for white.
    pub white_time_left: i32,
    /// Stored seconds left for black.
    pub black_time_left: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// White player profile, when loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_player: Option<UserDto>,
    /// Black player profile, when loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_player: Option<UserDto>,
}

impl From<GameRecord> for GameDto {
    fn from(game: GameRecord) -> Self {
        Self {
            id: game.id,
            white_player_id: game.white_player_id,
            black_player_id: game.black_player_id,
            status: game.status,
            result: game.result,
            current_fen: game.current_position,
            pgn: game.notation_log,
            time_control: game.time_budget_total,
            white_time_left: game.white_time_remaining,
            black_time_left: game.black_time_remaining,
            created_at: game.created_at,
            updated_at: game.updated_at,
            white_player: None,
            black_player: None,
        }
    }
}

impl From<GameView> for GameDto {
    fn from(view: GameView) -> Self {
        Self {
            white_player: view.white.map(UserDto::from),
            black_player: view.black.map(UserDto::from),
            ..Self::from(view.game)
        }
    }
}

/// A committed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveDto {
    /// Move identifier.
    pub id: MoveId,
    /// Owning game.
    pub game_id: GameId,
    /// Player who moved.
    pub player_id: UserId,
    /// UCI notation.
    pub move_notation: String,
    /// FEN after the move.
    pub board_state: String,
    /// 1-based half-move index.
    pub ply_number: i32,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<MoveRecord> for MoveDto {
    fn from(record: MoveRecord) -> Self {
        Self {
            id: record.id,
            game_id: record.game_id,
            player_id: record.player_id,
            move_notation: record.notation,
            board_state: record.position_after,
            ply_number: record.ply_number,
            created_at: record.created_at,
        }
    }
}
