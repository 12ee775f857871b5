//! In-process storage used by tests and local runs without a database.
//!
//! All tables live behind one async mutex. A transaction holds the lock for
//! its whole lifetime and mutates a working copy; commit swaps the copy in,
//! drop discards it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{GameStore, GameTx, UserStore};
use crate::domain::{
    GameId, GameRecord, GameResult, GameStatus, GameView, INITIAL_RATING, MoveId, MoveRecord,
    NewGame, NewMove, NewUser, RefreshCredential, UserId, UserRecord,
};
use crate::error::ServerError;

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    games: BTreeMap<GameId, GameRecord>,
    moves: BTreeMap<GameId, Vec<MoveRecord>>,
    refresh_tokens: HashMap<String, RefreshCredential>,
    next_user: i64,
    next_game: i64,
    next_move: i64,
}

impl Tables {
    fn view(&self, game: &GameRecord) -> GameView {
        let user = |id: Option<UserId>| id.and_then(|id| self.users.get(&id).cloned());
        GameView {
            white: user(game.white_player_id),
            black: user(game.black_player_id),
            game: game.clone(),
        }
    }

    fn moves_of(&self, game: GameId) -> Vec<MoveRecord> {
        self.moves.get(&game).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Faults {
    user_updates: AtomicBool,
}

/// Storage kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `update_user_stats` fail with a storage error
    /// while `enabled` is set.
    pub fn fail_user_updates(&self, enabled: bool) {
        self.faults.user_updates.store(enabled, Ordering::SeqCst);
    }

    /// Returns a user record, bypassing any transaction.
    pub async fn user(&self, id: UserId) -> Option<UserRecord> {
        self.tables.lock().await.users.get(&id).cloned()
    }

    /// Returns the number of stored moves for a game.
    pub async fn move_count(&self, game: GameId) -> usize {
        self.tables.lock().await.moves.get(&game).map_or(0, Vec::len)
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn GameTx>, ServerError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            work,
            faults: Arc::clone(&self.faults),
        }))
    }

    async fn find_game(&self, id: GameId) -> Result<Option<GameView>, ServerError> {
        let tables = self.tables.lock().await;
        Ok(tables.games.get(&id).map(|g| tables.view(g)))
    }

    async fn list_user_games(&self, user: UserId) -> Result<Vec<GameView>, ServerError> {
        let tables = self.tables.lock().await;
        let mut games: Vec<&GameRecord> = tables
            .games
            .values()
            .filter(|g| g.is_participant(user))
            .collect();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(games.into_iter().map(|g| tables.view(g)).collect())
    }

    async fn list_moves(&self, game: GameId) -> Result<Vec<MoveRecord>, ServerError> {
        Ok(self.tables.lock().await.moves_of(game))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, ServerError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(ServerError::Conflict("username already taken".into()));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(ServerError::Conflict("email already registered".into()));
        }
        tables.next_user += 1;
        let record = UserRecord {
            id: UserId::new(tables.next_user),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            avatar_url: None,
            rating: INITIAL_RATING,
            games_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            created_at: Utc::now(),
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, ServerError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServerError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_avatar(
        &self,
        id: UserId,
        avatar_url: &str,
    ) -> Result<Option<UserRecord>, ServerError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.get_mut(&id).map(|u| {
            u.avatar_url = Some(avatar_url.to_string());
            u.clone()
        }))
    }

    async fn save_refresh_token(&self, credential: RefreshCredential) -> Result<(), ServerError> {
        let mut tables = self.tables.lock().await;
        if tables.refresh_tokens.contains_key(&credential.token_hash) {
            return Err(ServerError::Conflict("duplicate refresh token".into()));
        }
        tables
            .refresh_tokens
            .insert(credential.token_hash.clone(), credential);
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshCredential>, ServerError> {
        Ok(self.tables.lock().await.refresh_tokens.get(token_hash).cloned())
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<(), ServerError> {
        self.tables.lock().await.refresh_tokens.remove(token_hash);
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
    faults: Arc<Faults>,
}

#[async_trait]
impl GameTx for MemoryTx {
    async fn insert_game(&mut self, game: NewGame) -> Result<GameRecord, ServerError> {
        if !self.work.users.contains_key(&game.white_player_id) {
            return Err(ServerError::Storage(format!(
                "foreign key: user {} does not exist",
                game.white_player_id
            )));
        }
        self.work.next_game += 1;
        let now = Utc::now();
        let record = GameRecord {
            id: GameId::new(self.work.next_game),
            white_player_id: Some(game.white_player_id),
            black_player_id: None,
            status: GameStatus::Waiting,
            result: GameResult::None,
            current_position: game.position,
            notation_log: String::new(),
            time_budget_total: game.time_budget,
            white_time_remaining: game.time_budget,
            black_time_remaining: game.time_budget,
            created_at: now,
            updated_at: now,
        };
        self.work.games.insert(record.id, record.clone());
        Ok(record)
    }

    async fn lock_game(&mut self, id: GameId) -> Result<Option<GameRecord>, ServerError> {
        Ok(self.work.games.get(&id).cloned())
    }

    async fn list_moves(&mut self, game: GameId) -> Result<Vec<MoveRecord>, ServerError> {
        Ok(self.work.moves_of(game))
    }

    async fn lock_user(&mut self, id: UserId) -> Result<Option<UserRecord>, ServerError> {
        Ok(self.work.users.get(&id).cloned())
    }

    async fn insert_move(&mut self, mv: NewMove) -> Result<MoveRecord, ServerError> {
        self.work.next_move += 1;
        let id = MoveId::new(self.work.next_move);
        let moves = self.work.moves.entry(mv.game_id).or_default();
        if moves.iter().any(|m| m.ply_number == mv.ply_number) {
            return Err(ServerError::Storage(format!(
                "unique violation: game {} already has ply {}",
                mv.game_id, mv.ply_number
            )));
        }
        let record = MoveRecord {
            id,
            game_id: mv.game_id,
            player_id: mv.player_id,
            notation: mv.notation,
            position_after: mv.position_after,
            ply_number: mv.ply_number,
            created_at: Utc::now(),
        };
        moves.push(record.clone());
        Ok(record)
    }

    async fn update_game(&mut self, game: &GameRecord) -> Result<GameRecord, ServerError> {
        let stored = self
            .work
            .games
            .get_mut(&game.id)
            .ok_or(ServerError::GameNotFound(game.id))?;
        let mut updated = game.clone();
        updated.created_at = stored.created_at;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn update_user_stats(&mut self, user: &UserRecord) -> Result<(), ServerError> {
        if self.faults.user_updates.load(Ordering::SeqCst) {
            return Err(ServerError::Storage("injected user update failure".into()));
        }
        let stored = self
            .work
            .users
            .get_mut(&user.id)
            .ok_or(ServerError::UserNotFound(user.id))?;
        stored.rating = user.rating;
        stored.games_played = user.games_played;
        stored.wins = user.wins;
        stored.losses = user.losses;
        stored.draws = user.draws;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), ServerError> {
        let MemoryTx { mut guard, work, .. } = *self;
        *guard = work;
        Ok(())
    }
}
