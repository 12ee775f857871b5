//! Persistence layer: game, move, user and refresh-credential storage.
//!
//! Services talk to storage through the [`GameStore`] and [`UserStore`]
//! traits. Every mutation of a game goes through a [`GameTx`] unit of work
//! whose reads take row locks, so concurrent commits on the same game are
//! serialized by the store. [`PgStore`] is the PostgreSQL implementation;
//! [`MemoryStore`] keeps everything in process.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::{
    GameId, GameRecord, GameView, MoveRecord, NewGame, NewMove, NewUser, RefreshCredential,
    UserId, UserRecord,
};
use crate::error::ServerError;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read access to games plus the entry point for transactional writes.
#[async_trait]
pub trait GameStore: Send + Sync + Debug {
    /// Opens a unit of work.
    async fn begin(&self) -> Result<Box<dyn GameTx>, ServerError>;

    /// Loads a game together with both player records.
    async fn find_game(&self, id: GameId) -> Result<Option<GameView>, ServerError>;

    /// Lists every game `user` sits in, newest first.
    async fn list_user_games(&self, user: UserId) -> Result<Vec<GameView>, ServerError>;

    /// Lists the moves of a game by ascending ply.
    async fn list_moves(&self, game: GameId) -> Result<Vec<MoveRecord>, ServerError>;
}

/// One storage transaction. Dropping it without [`GameTx::commit`] discards
/// every write.
#[async_trait]
pub trait GameTx: Send {
    /// Inserts a waiting game.
    async fn insert_game(&mut self, game: NewGame) -> Result<GameRecord, ServerError>;

    /// Reads a game and locks it until the transaction ends.
    async fn lock_game(&mut self, id: GameId) -> Result<Option<GameRecord>, ServerError>;

    /// Lists the moves of a game by ascending ply.
    async fn list_moves(&mut self, game: GameId) -> Result<Vec<MoveRecord>, ServerError>;

    /// Reads a user and locks it until the transaction ends.
    async fn lock_user(&mut self, id: UserId) -> Result<Option<UserRecord>, ServerError>;

    /// Inserts a move row.
    async fn insert_move(&mut self, mv: NewMove) -> Result<MoveRecord, ServerError>;

    /// Writes the mutable game fields and returns the stored row.
    async fn update_game(&mut self, game: &GameRecord) -> Result<GameRecord, ServerError>;

    /// Writes rating and result counters.
    async fn update_user_stats(&mut self, user: &UserRecord) -> Result<(), ServerError>;

    /// Makes every write of this transaction durable.
    async fn commit(self: Box<Self>) -> Result<(), ServerError>;
}

/// Users and their refresh credentials.
#[async_trait]
pub trait UserStore: Send + Sync + Debug {
    /// Inserts a user; a taken username or email is a `Conflict`.
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, ServerError>;

    /// Loads a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, ServerError>;

    /// Loads a user by normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServerError>;

    /// Sets the avatar URL and returns the updated user.
    async fn update_avatar(
        &self,
        id: UserId,
        avatar_url: &str,
    ) -> Result<Option<UserRecord>, ServerError>;

    /// Stores a refresh credential digest.
    async fn save_refresh_token(&self, credential: RefreshCredential) -> Result<(), ServerError>;

    /// Looks up a refresh credential by digest.
    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshCredential>, ServerError>;

    /// Deletes a refresh credential; absent digests are ignored.
    async fn delete_refresh_token(&self, token_hash: &str) -> Result<(), ServerError>;
}
