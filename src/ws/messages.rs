//! Duplex session frames.
//!
//! Every frame is a JSON object discriminated by `type`. Clients only
//! send `move`; any other `type` decodes to [`ClientFrame::Unknown`] and is
//! ignored.

use serde::{Deserialize, Serialize};

use crate::api::dto::MoveDto;
use crate::chess::Color;
use crate::domain::{GameId, GameRecord, GameResult, GameStatus, UserId};
use crate::error::ServerError;
use crate::service::CommittedMove;

/// Server to client frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Snapshot sent once when the session opens.
    GameState {
        /// Game the session is bound to.
        game_id: GameId,
        /// Current position.
        fen: String,
        /// Lifecycle stage.
        status: GameStatus,
        /// Outcome so far.
        result: GameResult,
        /// White seat.
        white_player_id: Option<UserId>,
        /// Black seat.
        black_player_id: Option<UserId>,
        /// Whether the receiving player has white.
        is_white: bool,
    },
    /// A committed move, fanned out to every subscriber of the game.
    Move {
        /// The stored move.
        #[serde(rename = "move")]
        played: MoveDto,
        /// Position after the move.
        fen: String,
        /// Lifecycle stage after the move.
        status: GameStatus,
        /// Outcome after the move.
        result: GameResult,
    },
    /// Private rejection of this client's move.
    Error {
        /// Human-readable reason.
        error: String,
    },
}

impl ServerFrame {
    /// Builds the opening snapshot for a player seated as `color`.
    #[must_use]
    pub fn snapshot(game: &GameRecord, color: Color) -> Self {
        Self::GameState {
            game_id: game.id,
            fen: game.current_position.clone(),
            status: game.status,
            result: game.result,
            white_player_id: game.white_player_id,
            black_player_id: game.black_player_id,
            is_white: color == Color::White,
        }
    }

    /// Builds the broadcast for a committed move.
    #[must_use]
    pub fn committed(committed: CommittedMove) -> Self {
        Self::Move {
            played: committed.record.into(),
            fen: committed.game.current_position,
            status: committed.game.status,
            result: committed.game.result,
        }
    }

    /// Builds a private error frame.
    #[must_use]
    pub fn error(err: &ServerError) -> Self {
        Self::Error {
            error: err.to_string(),
        }
    }
}

/// Client to server frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Move request in UCI notation.
    Move {
        /// e.g. `e2e4` or `e7e8q`.
        uci: String,
    },
    /// Any frame type this server does not handle.
    #[serde(other)]
    Unknown,
}

impl ClientFrame {
    /// Decodes a text frame. Malformed JSON yields `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
