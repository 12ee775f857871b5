//! Service layer: business logic orchestration.
//!
//! [`GameService`] is the only writer of games, moves and player stats.
//! [`MatchmakingQueue`] pairs waiting players through it, and
//! [`AuthService`] owns accounts and refresh credentials.

pub mod auth_service;
pub mod game_service;
pub mod matchmaking;

pub use auth_service::{AuthService, AuthSession};
pub use game_service::{CommittedMove, GameService};
pub use matchmaking::{EnqueueOutcome, MatchPolicy, MatchmakingQueue};
