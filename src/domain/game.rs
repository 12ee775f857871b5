//! Game and move records plus the lifecycle view over them.
//!
//! [`GameRecord`] mirrors the storage layout: nullable player ids and a flat
//! status/result pair. Decisions about who may join or move are taken on
//! [`Seating`], the tagged view that only exists when the row is consistent.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{GameId, MoveId, UserId, UserRecord};
use crate::chess::{Color, Outcome};
use crate::error::ServerError;

/// Time budget applied when a game is created without a positive one.
pub const DEFAULT_TIME_BUDGET_SECS: i32 = 600;

/// Lifecycle stage of a game. Never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Created, waiting for the second player.
    Waiting,
    /// Both seats taken, moves accepted.
    Active,
    /// Terminal outcome reached.
    Finished,
}

impl GameStatus {
    /// Returns the storage / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "finished" => Ok(Self::Finished),
            other => Err(ServerError::Internal(format!("unknown game status {other:?}"))),
        }
    }
}

/// Result of a game; `None` until the game finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    /// No result yet.
    None,
    /// White delivered mate.
    WhiteWins,
    /// Black delivered mate.
    BlackWins,
    /// Stalemate, repetition, fifty-move rule or insufficient material.
    Draw,
}

impl GameResult {
    /// Returns the storage / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::WhiteWins => "white_wins",
            Self::BlackWins => "black_wins",
            Self::Draw => "draw",
        }
    }

    /// Returns the PGN result token (`*` while undecided).
    #[must_use]
    pub const fn pgn_token(self) -> &'static str {
        match self {
            Self::None => "*",
            Self::WhiteWins => "1-0",
            Self::BlackWins => "0-1",
            Self::Draw => "1/2-1/2",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameResult {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "white_wins" => Ok(Self::WhiteWins),
            "black_wins" => Ok(Self::BlackWins),
            "draw" => Ok(Self::Draw),
            other => Err(ServerError::Internal(format!("unknown game result {other:?}"))),
        }
    }
}

impl From<Outcome> for GameResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::WhiteWins => Self::WhiteWins,
            Outcome::BlackWins => Self::BlackWins,
            Outcome::Draw => Self::Draw,
        }
    }
}

/// A persisted game row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    /// Game identifier.
    pub id: GameId,
    /// Creator / white seat.
    pub white_player_id: Option<UserId>,
    /// Second seat; unset while waiting.
    pub black_player_id: Option<UserId>,
    /// Lifecycle stage.
    pub status: GameStatus,
    /// Outcome once finished.
    pub result: GameResult,
    /// FEN of the authoritative position.
    pub current_position: String,
    /// PGN movetext of the moves played so far.
    pub notation_log: String,
    /// Configured seconds per player.
    pub time_budget_total: i32,
    /// Seconds left for white (persisted, not decremented).
    pub white_time_remaining: i32,
    /// Seconds left for black (persisted, not decremented).
    pub black_time_remaining: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle view of a consistent game row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seating {
    /// Only the creator is seated.
    Waiting {
        /// Creator, playing white.
        white: UserId,
    },
    /// Both seats taken and the game is in progress.
    Active {
        /// White player.
        white: UserId,
        /// Black player.
        black: UserId,
    },
    /// The game reached a terminal outcome.
    Finished {
        /// White player.
        white: UserId,
        /// Black player.
        black: UserId,
        /// Final outcome.
        outcome: Outcome,
    },
}

impl GameRecord {
    /// Returns the color `user_id` plays in this game, if seated.
    #[must_use]
    pub fn color_of(&self, user_id: UserId) -> Option<Color> {
        if self.white_player_id == Some(user_id) {
            Some(Color::White)
        } else if self.black_player_id == Some(user_id) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Returns `true` if `user_id` holds either seat.
    #[must_use]
    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.color_of(user_id).is_some()
    }

    /// Builds the lifecycle view, rejecting rows that break the status
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Internal`] when the seats or result disagree
    /// with the status.
    pub fn seating(&self) -> Result<Seating, ServerError> {
        let corrupt = |why: &str| {
            ServerError::Internal(format!("game {} is inconsistent: {why}", self.id))
        };
        match (self.status, self.white_player_id, self.black_player_id) {
            (GameStatus::Waiting, Some(white), None) if self.result == GameResult::None => {
                Ok(Seating::Waiting { white })
            }
            (GameStatus::Active, Some(white), Some(black)) if self.result == GameResult::None => {
                if white == black {
                    return Err(corrupt("same player on both seats"));
                }
                Ok(Seating::Active { white, black })
            }
            (GameStatus::Finished, Some(white), Some(black)) => {
                let outcome = match self.result {
                    GameResult::WhiteWins => Outcome::WhiteWins,
                    GameResult::BlackWins => Outcome::BlackWins,
                    GameResult::Draw => Outcome::Draw,
                    GameResult::None => return Err(corrupt("finished without a result")),
                };
                Ok(Seating::Finished {
                    white,
                    black,
                    outcome,
                })
            }
            (status, _, _) => Err(corrupt(&format!("seats do not match status {status}"))),
        }
    }
}

/// Fields required to insert a new waiting game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    /// Creator, seated as white.
    pub white_player_id: UserId,
    /// Starting FEN.
    pub position: String,
    /// Seconds per player.
    pub time_budget: i32,
}

/// A game together with both player records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    /// The game row.
    pub game: GameRecord,
    /// White player, when seated.
    pub white: Option<UserRecord>,
    /// Black player, when seated.
    pub black: Option<UserRecord>,
}

/// A committed, immutable move row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    /// Move identifier.
    pub id: MoveId,
    /// Owning game.
    pub game_id: GameId,
    /// Player who made the move.
    pub player_id: UserId,
    /// UCI notation as submitted.
    pub notation: String,
    /// FEN after the move.
    pub position_after: String,
    /// 1-based half-move index, contiguous per game.
    pub ply_number: i32,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a move row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMove {
    /// Owning game.
    pub game_id: GameId,
    /// Player who made the move.
    pub player_id: UserId,
    /// UCI notation.
    pub notation: String,
    /// FEN after the move.
    pub position_after: String,
    /// Ply index computed inside the committing transaction.
    pub ply_number: i32,
}
