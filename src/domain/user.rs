//! Registered players and their stored refresh credentials.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::UserId;

/// Rating assigned to newly registered players.
pub const INITIAL_RATING: i32 = 1200;

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    /// User identifier.
    pub id: UserId,
    /// Unique display name.
    pub username: String,
    /// Unique, lowercased email.
    pub email: String,
    /// Argon2 PHC hash. Never serialized.
    #[serde(skip)]
    pub password_hash: String,
    /// Optional avatar location.
    pub avatar_url: Option<String>,
    /// Elo rating, never negative.
    pub rating: i32,
    /// Finished games, equal to `wins + losses + draws`.
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

impl UserRecord {
    /// Records a finished game and stores the new rating.
    pub fn record_result(&mut self, result: PlayerResult, new_rating: i32) {
        self.rating = new_rating.max(0);
        self.games_played += 1;
        match result {
            PlayerResult::Win => self.wins += 1,
            PlayerResult::Loss => self.losses += 1,
            PlayerResult::Draw => self.draws += 1,
        }
    }
}

/// One player's side of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerResult {
    /// The player won.
    Win,
    /// The player lost.
    Loss,
    /// The game was drawn.
    Draw,
}

/// Fields required to register a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name, already trimmed.
    pub username: String,
    /// Email, already trimmed and lowercased.
    pub email: String,
    /// Argon2 PHC hash.
    pub password_hash: String,
}

/// A stored refresh token. Only the SHA-256 digest is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCredential {
    /// Owner.
    pub user_id: UserId,
    /// Hex SHA-256 digest of the issued token.
    pub token_hash: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}
