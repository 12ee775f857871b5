//! PostgreSQL implementation of the persistence layer.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;

use super::models::{GameRow, MoveRow, RefreshTokenRow, UserRow};
use super::{GameStore, GameTx, UserStore};
use crate::config::ServerConfig;
use crate::domain::{
    GameId, GameRecord, GameView, MoveRecord, NewGame, NewMove, NewUser, RefreshCredential,
    UserId, UserRecord,
};
use crate::error::ServerError;

const USER_COLUMNS: &str = "id, username, email, password_hash, avatar_url, elo_rating, \
                            games_played, wins, losses, draws, created_at";

const GAME_COLUMNS: &str = "id, white_player_id, black_player_id, status, result, current_fen, \
                            pgn, time_control, white_time_left, black_time_left, created_at, \
                            updated_at";

const MOVE_COLUMNS: &str =
    "id, game_id, player_id, move_notation, board_state, ply_number, created_at";

/// Tables dropped by the development reset, children first.
const RESET_TABLES: &str = "DROP TABLE IF EXISTS moves, refresh_tokens, games, users, \
                            _sqlx_migrations CASCADE";

fn storage(e: sqlx::Error) -> ServerError {
    ServerError::Storage(e.to_string())
}

/// Maps unique violations to `Conflict`, everything else to `Storage`.
fn insert_error(e: sqlx::Error) -> ServerError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let what = match db.constraint() {
                Some(c) if c.contains("username") => "username already taken",
                Some(c) if c.contains("email") => "email already registered",
                _ => "duplicate value",
            };
            return ServerError::Conflict(what.to_string());
        }
    }
    storage(e)
}

/// PostgreSQL-backed storage using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Storage`] when the database is unreachable.
    pub async fn connect(config: &ServerConfig) -> Result<Self, ServerError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(storage)?;
        Ok(Self::new(pool))
    }

    /// Applies the schema migrations, dropping every table first when
    /// `reset` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Storage`] if the reset or a migration fails.
    pub async fn migrate(&self, reset: bool) -> Result<(), ServerError> {
        if reset {
            tracing::warn!("development mode: dropping all tables before migrating");
            sqlx::query(RESET_TABLES)
                .execute(&self.pool)
                .await
                .map_err(storage)?;
        }
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| ServerError::Storage(format!("migration failed: {e}")))
    }

    async fn users_by_id(&self, ids: Vec<i64>) -> Result<HashMap<i64, UserRecord>, ServerError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(|r| (r.id, UserRecord::from(r))).collect())
    }

    async fn attach_players(&self, games: Vec<GameRecord>) -> Result<Vec<GameView>, ServerError> {
        let mut ids: Vec<i64> = games
            .iter()
            .flat_map(|g| [g.white_player_id, g.black_player_id])
            .flatten()
            .map(UserId::get)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        let users = self.users_by_id(ids).await?;
        let pick = |id: Option<UserId>| id.and_then(|id| users.get(&id.get()).cloned());

        Ok(games
            .into_iter()
            .map(|game| GameView {
                white: pick(game.white_player_id),
                black: pick(game.black_player_id),
                game,
            })
            .collect())
    }
}

#[async_trait]
impl GameStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn GameTx>, ServerError> {
        let tx = self.pool.begin().await.map_err(storage)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_game(&self, id: GameId) -> Result<Option<GameView>, ServerError> {
        let row = sqlx::query_as::<_, GameRow>(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let game = GameRecord::try_from(row)?;
        Ok(self.attach_players(vec![game]).await?.into_iter().next())
    }

    async fn list_user_games(&self, user: UserId) -> Result<Vec<GameView>, ServerError> {
        let rows = sqlx::query_as::<_, GameRow>(&format!(
            "SELECT {GAME_COLUMNS} FROM games \
             WHERE white_player_id = $1 OR black_player_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user.get())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let games = rows
            .into_iter()
            .map(GameRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_players(games).await
    }

    async fn list_moves(&self, game: GameId) -> Result<Vec<MoveRecord>, ServerError> {
        let rows = sqlx::query_as::<_, MoveRow>(&format!(
            "SELECT {MOVE_COLUMNS} FROM moves WHERE game_id = $1 ORDER BY ply_number ASC"
        ))
        .bind(game.get())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(MoveRecord::from).collect())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, ServerError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(insert_error)?;
        Ok(row.into())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, ServerError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServerError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(UserRecord::from))
    }

    async fn update_avatar(
        &self,
        id: UserId,
        avatar_url: &str,
    ) -> Result<Option<UserRecord>, ServerError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET avatar_url = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.get())
        .bind(avatar_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(UserRecord::from))
    }

    async fn save_refresh_token(&self, credential: RefreshCredential) -> Result<(), ServerError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(credential.user_id.get())
        .bind(&credential.token_hash)
        .bind(credential.expires_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshCredential>, ServerError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT user_id, token_hash, expires_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(RefreshCredential::from))
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<(), ServerError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

/// An open PostgreSQL transaction. Row reads take `FOR UPDATE` locks.
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl GameTx for PgTx {
    async fn insert_game(&mut self, game: NewGame) -> Result<GameRecord, ServerError> {
        let row = sqlx::query_as::<_, GameRow>(&format!(
            "INSERT INTO games (white_player_id, current_fen, time_control, white_time_left, \
             black_time_left) VALUES ($1, $2, $3, $3, $3) RETURNING {GAME_COLUMNS}"
        ))
        .bind(game.white_player_id.get())
        .bind(&game.position)
        .bind(game.time_budget)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(storage)?;
        GameRecord::try_from(row)
    }

    async fn lock_game(&mut self, id: GameId) -> Result<Option<GameRecord>, ServerError> {
        let row = sqlx::query_as::<_, GameRow>(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage)?;
        row.map(GameRecord::try_from).transpose()
    }

    async fn list_moves(&mut self, game: GameId) -> Result<Vec<MoveRecord>, ServerError> {
        let rows = sqlx::query_as::<_, MoveRow>(&format!(
            "SELECT {MOVE_COLUMNS} FROM moves WHERE game_id = $1 ORDER BY ply_number ASC"
        ))
        .bind(game.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(MoveRecord::from).collect())
    }

    async fn lock_user(&mut self, id: UserId) -> Result<Option<UserRecord>, ServerError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(row.map(UserRecord::from))
    }

    async fn insert_move(&mut self, mv: NewMove) -> Result<MoveRecord, ServerError> {
        let row = sqlx::query_as::<_, MoveRow>(&format!(
            "INSERT INTO moves (game_id, player_id, move_notation, board_state, ply_number) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {MOVE_COLUMNS}"
        ))
        .bind(mv.game_id.get())
        .bind(mv.player_id.get())
        .bind(&mv.notation)
        .bind(&mv.position_after)
        .bind(mv.ply_number)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(row.into())
    }

    async fn update_game(&mut self, game: &GameRecord) -> Result<GameRecord, ServerError> {
        let row = sqlx::query_as::<_, GameRow>(&format!(
            "UPDATE games SET black_player_id = $2, status = $3, result = $4, current_fen = $5, \
             pgn = $6, white_time_left = $7, black_time_left = $8, updated_at = NOW() \
             WHERE id = $1 RETURNING {GAME_COLUMNS}"
        ))
        .bind(game.id.get())
        .bind(game.black_player_id.map(UserId::get))
        .bind(game.status.as_str())
        .bind(game.result.as_str())
        .bind(&game.current_position)
        .bind(&game.notation_log)
        .bind(game.white_time_remaining)
        .bind(game.black_time_remaining)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage)?
        .ok_or(ServerError::GameNotFound(game.id))?;
        GameRecord::try_from(row)
    }

    async fn update_user_stats(&mut self, user: &UserRecord) -> Result<(), ServerError> {
        let result = sqlx::query(
            "UPDATE users SET elo_rating = $2, games_played = $3, wins = $4, losses = $5, \
             draws = $6, updated_at = NOW() WHERE id = $1",
        )
        .bind(user.id.get())
        .bind(user.rating)
        .bind(user.games_played)
        .bind(user.wins)
        .bind(user.losses)
        .bind(user.draws)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(ServerError::UserNotFound(user.id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), ServerError> {
        self.tx.commit().await.map_err(storage)
    }
}
