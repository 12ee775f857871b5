//! Database row shapes and their conversion into domain records.

use chrono::{DateTime, Utc};

use crate::domain::{
    GameId, GameRecord, MoveId, MoveRecord, RefreshCredential, UserId, UserRecord,
};
use crate::error::ServerError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// Row id.
    pub id: i64,
    /// Unique display name.
    pub username: String,
    /// Unique lowercased email.
    pub email: String,
    /// Argon2 PHC hash.
    pub password_hash: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Elo rating.
    pub elo_rating: i32,
    /// Finished games.
    pub games_played: i32,
    /// Games won.
    pub wins: i32,
    /// Games lost.
    pub losses: i32,
    /// Games drawn.
    pub draws: i32,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            avatar_url: row.avatar_url,
            rating: row.elo_rating,
            games_played: row.games_played,
            wins: row.wins,
            losses: row.losses,
            draws: row.draws,
            created_at: row.created_at,
        }
    }
}

/// A row from the `games` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameRow {
    /// Row id.
    pub id: i64,
    /// White seat.
    pub white_player_id: Option<i64>,
    /// Black seat.
    pub black_player_id: Option<i64>,
    /// `waiting`, `active` or `finished`.
    pub status: String,
    /// `none`, `white_wins`, `black_wins` or `draw`.
    pub result: String,
    /// Current position.
    pub current_fen: String,
    /// Movetext.
    pub pgn: String,
    /// Seconds per player.
    pub time_control: i32,
    /// White clock.
    pub white_time_left: i32,
    /// Black clock.
    pub black_time_left: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<GameRow> for GameRecord {
    type Error = ServerError;

    fn try_from(row: GameRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: GameId::new(row.id),
            white_player_id: row.white_player_id.map(UserId::new),
            black_player_id: row.black_player_id.map(UserId::new),
            status: row.status.parse()?,
            result: row.result.parse()?,
            current_position: row.current_fen,
            notation_log: row.pgn,
            time_budget_total: row.time_control,
            white_time_remaining: row.white_time_left,
            black_time_remaining: row.black_time_left,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `moves` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MoveRow {
    /// Row id.
    pub id: i64,
    /// Owning game.
    pub game_id: i64,
    /// Moving player.
    pub player_id: i64,
    /// UCI notation.
    pub move_notation: String,
    /// FEN after the move.
    pub board_state: String,
    /// 1-based ply.
    pub ply_number: i32,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

impl From<MoveRow> for MoveRecord {
    fn from(row: MoveRow) -> Self {
        Self {
            id: MoveId::new(row.id),
            game_id: GameId::new(row.game_id),
            player_id: UserId::new(row.player_id),
            notation: row.move_notation,
            position_after: row.board_state,
            ply_number: row.ply_number,
            created_at: row.created_at,
        }
    }
}

/// A row from the `refresh_tokens` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRow {
    /// Owner.
    pub user_id: i64,
    /// SHA-256 hex digest.
    pub token_hash: String,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshCredential {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            token_hash: row.token_hash,
            expires_at: row.expires_at,
        }
    }
}
