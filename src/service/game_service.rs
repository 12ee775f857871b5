//! Game service: game lifecycle and the atomic move commit.

use std::sync::Arc;

use crate::chess::{ChessEngine, PgnExport, STARTING_FEN};
use crate::domain::{
    DEFAULT_TIME_BUDGET_SECS, GameId, GameRecord, GameResult, GameStatus, GameView, MoveRecord,
    NewGame, NewMove, Seating, UserId, rating,
};
use crate::error::ServerError;
use crate::persistence::{GameStore, GameTx};

/// Result of a successful [`GameService::commit_move`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedMove {
    /// The inserted move row.
    pub record: MoveRecord,
    /// The game row after the commit.
    pub game: GameRecord,
}

/// Sole writer of games, moves and player statistics.
///
/// Every mutation runs inside one storage transaction whose row locks
/// serialize concurrent callers per game.
#[derive(Debug, Clone)]
pub struct GameService {
    store: Arc<dyn GameStore>,
}

impl GameService {
    /// Creates a new `GameService`.
    #[must_use]
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Creates a waiting game with `owner` as white. A non-positive budget
    /// falls back to the default.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Storage`] on database failure.
    pub async fn create_game(
        &self,
        owner: UserId,
        time_budget: i32,
    ) -> Result<GameRecord, ServerError> {
        let time_budget = if time_budget > 0 {
            time_budget
        } else {
            DEFAULT_TIME_BUDGET_SECS
        };
        let mut tx = self.store.begin().await?;
        let game = tx
            .insert_game(NewGame {
                white_player_id: owner,
                position: STARTING_FEN.to_string(),
                time_budget,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(game_id = %game.id, user_id = %owner, time_budget, "game created");
        Ok(game)
    }

    /// Loads a game with both players.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::GameNotFound`] for unknown ids.
    pub async fn get_game(&self, id: GameId) -> Result<GameView, ServerError> {
        self.store
            .find_game(id)
            .await?
            .ok_or(ServerError::GameNotFound(id))
    }

    /// Seats `joiner` as black and activates the game. Of two concurrent
    /// joiners at most one succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::GameNotFound`] for unknown ids,
    /// [`ServerError::GameNotJoinable`] if the game is not waiting or the
    /// joiner created it, and [`ServerError::UserNotFound`] for an unknown
    /// joiner.
    pub async fn join_game(&self, id: GameId, joiner: UserId) -> Result<GameRecord, ServerError> {
        let mut tx = self.store.begin().await?;
        let mut game = tx
            .lock_game(id)
            .await?
            .ok_or(ServerError::GameNotFound(id))?;

        match game.seating()? {
            Seating::Waiting { white } if white == joiner => {
                return Err(ServerError::GameNotJoinable(
                    "cannot join your own game".into(),
                ));
            }
            Seating::Waiting { .. } => {}
            Seating::Active { .. } | Seating::Finished { .. } => {
                return Err(ServerError::GameNotJoinable(
                    "game is not waiting for an opponent".into(),
                ));
            }
        }
        if tx.lock_user(joiner).await?.is_none() {
            return Err(ServerError::UserNotFound(joiner));
        }

        game.black_player_id = Some(joiner);
        game.status = GameStatus::Active;
        let game = tx.update_game(&game).await?;
        tx.commit().await?;

        tracing::info!(game_id = %id, user_id = %joiner, "game joined");
        Ok(game)
    }

    /// Lists the games `user` plays in, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Storage`] on database failure.
    pub async fn list_user_games(&self, user: UserId) -> Result<Vec<GameView>, ServerError> {
        self.store.list_user_games(user).await
    }

    /// Lists the moves of a game by ascending ply.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::GameNotFound`] for unknown ids.
    pub async fn list_game_history(&self, id: GameId) -> Result<Vec<MoveRecord>, ServerError> {
        if self.store.find_game(id).await?.is_none() {
            return Err(ServerError::GameNotFound(id));
        }
        self.store.list_moves(id).await
    }

    /// Validates and commits one move.
    ///
    /// The game row, the move insert, the position update and, for a
    /// terminal move, both players' rating updates happen in one
    /// transaction; any failure leaves no trace.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::GameNotFound`], [`ServerError::NotAParticipant`],
    /// [`ServerError::GameNotStarted`], [`ServerError::GameAlreadyTerminal`],
    /// [`ServerError::NotYourTurn`], [`ServerError::InvalidMoveSyntax`],
    /// [`ServerError::IllegalMove`] or [`ServerError::Storage`].
    pub async fn commit_move(
        &self,
        id: GameId,
        player: UserId,
        uci: &str,
    ) -> Result<CommittedMove, ServerError> {
        let mut tx = self.store.begin().await?;
        let mut game = tx
            .lock_game(id)
            .await?
            .ok_or(ServerError::GameNotFound(id))?;

        let color = game.color_of(player).ok_or(ServerError::NotAParticipant)?;
        let (white, black) = match game.seating()? {
            Seating::Waiting { .. } => return Err(ServerError::GameNotStarted),
            Seating::Finished { .. } => return Err(ServerError::GameAlreadyTerminal),
            Seating::Active { white, black } => (white, black),
        };

        let moves = tx.list_moves(id).await?;
        let mut engine = rebuild_engine(&game, &moves)?;
        if engine.side_to_move() != color {
            return Err(ServerError::NotYourTurn);
        }
        engine.validate(uci)?;
        let applied = engine.apply(uci)?;

        let ply = i32::try_from(moves.len() + 1)
            .map_err(|_| ServerError::Internal(format!("game {id} has too many moves")))?;
        let position = engine.fen();
        let record = tx
            .insert_move(NewMove {
                game_id: id,
                player_id: player,
                notation: applied.uci,
                position_after: position.clone(),
                ply_number: ply,
            })
            .await?;

        game.current_position = position;
        game.notation_log = engine.notation_log();

        if let Some(reason) = engine.terminal_reason() {
            game.status = GameStatus::Finished;
            game.result = reason.outcome().into();
            settle_ratings(tx.as_mut(), white, black, game.result).await?;
            tracing::info!(
                game_id = %id,
                outcome = %game.result,
                reason = reason.as_str(),
                ply,
                "game finished"
            );
        }

        let game = tx.update_game(&game).await?;
        tx.commit().await?;

        tracing::debug!(game_id = %id, user_id = %player, ply, san = %applied.san, "move committed");
        Ok(CommittedMove { record, game })
    }

    /// Renders a game as PGN.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::GameNotFound`] for unknown ids.
    pub async fn export_pgn(&self, id: GameId) -> Result<String, ServerError> {
        let GameView { game, white, black } = self.get_game(id).await?;
        let export = PgnExport {
            event: "Casual game".into(),
            site: "gambit".into(),
            date: Some(game.created_at.date_naive()),
            round: "-".into(),
            white: white.as_ref().map(|u| u.username.clone()),
            black: black.as_ref().map(|u| u.username.clone()),
            result: game.result.pgn_token().into(),
            white_elo: white.as_ref().map(|u| u.rating),
            black_elo: black.as_ref().map(|u| u.rating),
            time_control: Some(game.time_budget_total),
            movetext: game.notation_log,
        };
        Ok(export.render())
    }
}

/// Rebuilds the engine at the stored position, seeding repetition history
/// from every earlier position of the game.
fn rebuild_engine(game: &GameRecord, moves: &[MoveRecord]) -> Result<ChessEngine, ServerError> {
    let earlier: Vec<&str> = match moves.split_last() {
        None => Vec::new(),
        Some((_, before)) => std::iter::once(STARTING_FEN)
            .chain(before.iter().map(|m| m.position_after.as_str()))
            .collect(),
    };
    Ok(ChessEngine::from_fen(&game.current_position)?
        .with_history(earlier)?
        .with_notation_log(&game.notation_log))
}

/// Applies Elo and result counters to both players. Rows are locked in
/// ascending id order.
async fn settle_ratings(
    tx: &mut dyn GameTx,
    white: UserId,
    black: UserId,
    result: GameResult,
) -> Result<(), ServerError> {
    let Some((white_result, black_result)) = rating::player_results(result) else {
        return Ok(());
    };

    let (first, second) = if white < black {
        (white, black)
    } else {
        (black, white)
    };
    let first = tx
        .lock_user(first)
        .await?
        .ok_or(ServerError::UserNotFound(first))?;
    let second = tx
        .lock_user(second)
        .await?
        .ok_or(ServerError::UserNotFound(second))?;
    let (mut white_user, mut black_user) = if first.id == white {
        (first, second)
    } else {
        (second, first)
    };

    let (white_rating, black_rating) = rating::update(white_user.rating, black_user.rating, result);
    white_user.record_result(white_result, white_rating);
    black_user.record_result(black_result, black_rating);

    tx.update_user_stats(&white_user).await?;
    tx.update_user_stats(&black_user).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chess::ChessEngine;
    use crate::domain::{NewUser, UserRecord};
    use crate::persistence::{MemoryStore, UserStore};

    struct Fixture {
        store: MemoryStore,
        service: GameService,
        alice: UserRecord,
        bob: UserRecord,
    }

    async fn user(store: &MemoryStore, name: &str) -> UserRecord {
        let Ok(user) = store
            .insert_user(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password_hash: "hash".into(),
            })
            .await
        else {
            panic!("user insert failed");
        };
        user
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let service = GameService::new(Arc::new(store.clone()));
        Fixture {
            store,
            service,
            alice,
            bob,
        }
    }

    async fn active_game(f: &Fixture) -> GameId {
        let Ok(game) = f.service.create_game(f.alice.id, 0).await else {
            panic!("create failed");
        };
        let Ok(_) = f.service.join_game(game.id, f.bob.id).await else {
            panic!("join failed");
        };
        game.id
    }

    async fn play(f: &Fixture, id: GameId, moves: &[&str]) -> CommittedMove {
        let mut last = None;
        for (i, uci) in moves.iter().enumerate() {
            let player = if i % 2 == 0 { f.alice.id } else { f.bob.id };
            let Ok(committed) = f.service.commit_move(id, player, uci).await else {
                panic!("move {uci} should commit");
            };
            last = Some(committed);
        }
        let Some(last) = last else {
            panic!("no moves played");
        };
        last
    }

    #[tokio::test]
    async fn create_game_defaults_time_budget() {
        let f = fixture().await;
        let Ok(game) = f.service.create_game(f.alice.id, -5).await else {
            panic!("create failed");
        };
        assert_eq!(game.status, GameStatus::Waiting);
        assert_eq!(game.time_budget_total, DEFAULT_TIME_BUDGET_SECS);
        assert_eq!(game.white_time_remaining, DEFAULT_TIME_BUDGET_SECS);
        assert_eq!(game.current_position, STARTING_FEN);
        assert!(game.notation_log.is_empty());

        let Ok(custom) = f.service.create_game(f.alice.id, 180).await else {
            panic!("create failed");
        };
        assert_eq!(custom.black_time_remaining, 180);
    }

    #[tokio::test]
    async fn join_activates_and_rejects_self_join() {
        let f = fixture().await;
        let Ok(game) = f.service.create_game(f.alice.id, 0).await else {
            panic!("create failed");
        };
        assert!(matches!(
            f.service.join_game(game.id, f.alice.id).await,
            Err(ServerError::GameNotJoinable(_))
        ));

        let Ok(joined) = f.service.join_game(game.id, f.bob.id).await else {
            panic!("join failed");
        };
        assert_eq!(joined.status, GameStatus::Active);
        assert_eq!(joined.black_player_id, Some(f.bob.id));

        let carol = user(&f.store, "carol").await;
        assert!(matches!(
            f.service.join_game(game.id, carol.id).await,
            Err(ServerError::GameNotJoinable(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_joins_have_one_winner() {
        let f = fixture().await;
        let carol = user(&f.store, "carol").await;
        let Ok(game) = f.service.create_game(f.alice.id, 0).await else {
            panic!("create failed");
        };

        let a = tokio::spawn({
            let service = f.service.clone();
            let id = f.bob.id;
            async move { service.join_game(game.id, id).await }
        });
        let b = tokio::spawn({
            let service = f.service.clone();
            let id = carol.id;
            async move { service.join_game(game.id, id).await }
        });
        let (Ok(a), Ok(b)) = (a.await, b.await) else {
            panic!("join tasks panicked");
        };
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert!(
            matches!(a, Err(ServerError::GameNotJoinable(_)))
                || matches!(b, Err(ServerError::GameNotJoinable(_)))
        );
    }

    #[tokio::test]
    async fn join_unknown_game() {
        let f = fixture().await;
        assert!(matches!(
            f.service.join_game(GameId::new(404), f.bob.id).await,
            Err(ServerError::GameNotFound(_))
        ));
    }

    #[tokio::test]
    async fn fools_mate_settles_ratings() {
        let f = fixture().await;
        let id = active_game(&f).await;
        let last = play(&f, id, &["f2f3", "e7e5", "g2g4", "d8h4"]).await;

        assert_eq!(last.game.status, GameStatus::Finished);
        assert_eq!(last.game.result, GameResult::BlackWins);
        assert_eq!(last.record.ply_number, 4);
        assert_eq!(last.game.notation_log, "1. f3 e5 2. g4 Qh4# 0-1");

        let (Some(alice), Some(bob)) = (f.store.user(f.alice.id).await, f.store.user(f.bob.id).await)
        else {
            panic!("users should exist");
        };
        assert_eq!(alice.rating, 1184);
        assert_eq!(bob.rating, 1216);
        assert_eq!((alice.games_played, alice.losses), (1, 1));
        assert_eq!((bob.games_played, bob.wins), (1, 1));

        assert!(matches!(
            f.service.commit_move(id, f.alice.id, "a2a3").await,
            Err(ServerError::GameAlreadyTerminal)
        ));
    }

    #[tokio::test]
    async fn out_of_turn_move_changes_nothing() {
        let f = fixture().await;
        let id = active_game(&f).await;
        let first = play(&f, id, &["e2e4"]).await;

        assert!(matches!(
            f.service.commit_move(id, f.alice.id, "e4e5").await,
            Err(ServerError::NotYourTurn)
        ));
        let Ok(view) = f.service.get_game(id).await else {
            panic!("game should exist");
        };
        assert_eq!(view.game.current_position, first.game.current_position);
        assert_eq!(f.store.move_count(id).await, 1);
    }

    #[tokio::test]
    async fn move_errors_are_classified() {
        let f = fixture().await;
        let id = active_game(&f).await;
        let Ok(carol_game) = f.service.create_game(f.bob.id, 0).await else {
            panic!("create failed");
        };
        let carol = user(&f.store, "carol").await;

        assert!(matches!(
            f.service.commit_move(id, carol.id, "e2e4").await,
            Err(ServerError::NotAParticipant)
        ));
        assert!(matches!(
            f.service.commit_move(id, f.alice.id, "e2").await,
            Err(ServerError::InvalidMoveSyntax(_))
        ));
        assert!(matches!(
            f.service.commit_move(id, f.alice.id, "e2e5").await,
            Err(ServerError::IllegalMove(_))
        ));
        assert!(matches!(
            f.service.commit_move(carol_game.id, f.bob.id, "e2e4").await,
            Err(ServerError::GameNotStarted)
        ));
        assert!(matches!(
            f.service.commit_move(GameId::new(999), f.alice.id, "e2e4").await,
            Err(ServerError::GameNotFound(_))
        ));
        assert_eq!(f.store.move_count(id).await, 0);
    }

    #[tokio::test]
    async fn racing_moves_by_the_same_side_commit_once() {
        let f = fixture().await;
        let id = active_game(&f).await;

        let spawn_move = |uci: &'static str| {
            let service = f.service.clone();
            let player = f.alice.id;
            tokio::spawn(async move { service.commit_move(id, player, uci).await })
        };
        let a = spawn_move("e2e4");
        let b = spawn_move("d2d4");
        let (Ok(a), Ok(b)) = (a.await, b.await) else {
            panic!("move tasks panicked");
        };
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert!(matches!(a, Err(ServerError::NotYourTurn)) || matches!(b, Err(ServerError::NotYourTurn)));
        assert_eq!(f.store.move_count(id).await, 1);
    }

    #[tokio::test]
    async fn stalemate_is_a_rated_draw() {
        let f = fixture().await;
        let id = active_game(&f).await;
        let last = play(
            &f,
            id,
            &[
                "e2e3", "a7a5", "d1h5", "a8a6", "h5a5", "h7h5", "h2h4", "a6h6", "a5c7", "f7f6",
                "c7d7", "e8f7", "d7b7", "d8d3", "b7b8", "d3h7", "b8c8", "f7g6", "c8e6",
            ],
        )
        .await;
        assert_eq!(last.game.result, GameResult::Draw);

        let (Some(alice), Some(bob)) = (f.store.user(f.alice.id).await, f.store.user(f.bob.id).await)
        else {
            panic!("users should exist");
        };
        assert_eq!((alice.rating, alice.draws), (1200, 1));
        assert_eq!((bob.rating, bob.draws), (1200, 1));
    }

    #[tokio::test]
    async fn threefold_repetition_across_commits() {
        let f = fixture().await;
        let id = active_game(&f).await;
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
        let mid = play(&f, id, &shuffle).await;
        assert_eq!(mid.game.status, GameStatus::Active);
        let last = play(&f, id, &shuffle).await;
        assert_eq!(last.game.status, GameStatus::Finished);
        assert_eq!(last.game.result, GameResult::Draw);
    }

    #[tokio::test]
    async fn failed_rating_update_rolls_back_the_move() {
        let f = fixture().await;
        let id = active_game(&f).await;
        play(&f, id, &["f2f3", "e7e5", "g2g4"]).await;

        f.store.fail_user_updates(true);
        assert!(matches!(
            f.service.commit_move(id, f.bob.id, "d8h4").await,
            Err(ServerError::Storage(_))
        ));
        assert_eq!(f.store.move_count(id).await, 3);
        let Ok(view) = f.service.get_game(id).await else {
            panic!("game should exist");
        };
        assert_eq!(view.game.status, GameStatus::Active);

        f.store.fail_user_updates(false);
        let Ok(done) = f.service.commit_move(id, f.bob.id, "d8h4").await else {
            panic!("retry should commit");
        };
        assert_eq!(done.record.ply_number, 4);
    }

    #[tokio::test]
    async fn history_replays_to_stored_positions() {
        let f = fixture().await;
        let id = active_game(&f).await;
        let moves = ["e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4"];
        play(&f, id, &moves).await;

        let Ok(history) = f.service.list_game_history(id).await else {
            panic!("history should load");
        };
        let plies: Vec<i32> = history.iter().map(|m| m.ply_number).collect();
        assert_eq!(plies, [1, 2, 3, 4, 5, 6]);

        let mut engine = ChessEngine::new_initial();
        for m in &history {
            let Ok(_) = engine.apply(&m.notation) else {
                panic!("stored move should replay");
            };
            assert_eq!(engine.fen(), m.position_after);
        }
    }

    #[tokio::test]
    async fn lists_games_newest_first() {
        let f = fixture().await;
        let first = active_game(&f).await;
        let second = active_game(&f).await;
        let Ok(games) = f.service.list_user_games(f.bob.id).await else {
            panic!("list failed");
        };
        let ids: Vec<GameId> = games.iter().map(|v| v.game.id).collect();
        assert_eq!(ids, [second, first]);
    }

    #[tokio::test]
    async fn pgn_export_includes_players_and_result() {
        let f = fixture().await;
        let id = active_game(&f).await;
        play(&f, id, &["f2f3", "e7e5", "g2g4", "d8h4"]).await;
        let Ok(pgn) = f.service.export_pgn(id).await else {
            panic!("export failed");
        };
        assert!(pgn.contains("[White \"alice\"]"));
        assert!(pgn.contains("[Result \"0-1\"]"));
        assert!(pgn.contains("[BlackElo \"1216\"]"));
        assert!(pgn.trim_end().ends_with("Qh4# 0-1"));
    }
}
