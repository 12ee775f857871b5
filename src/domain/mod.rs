//! Domain layer: identifiers, game/move/user records and rating math.
//!
//! Records here are storage-shaped; [`Seating`] is the lifecycle view the
//! services reason about.

pub mod game;
pub mod ids;
pub mod rating;
pub mod user;

pub use game::{
    DEFAULT_TIME_BUDGET_SECS, GameRecord, GameResult, GameStatus, GameView, MoveRecord, NewGame,
    NewMove, Seating,
};
pub use ids::{ClientId, GameId, MoveId, UserId};
pub use user::{INITIAL_RATING, NewUser, PlayerResult, RefreshCredential, UserRecord};
