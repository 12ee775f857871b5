//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenService;
use crate::persistence::{GameStore, UserStore};
use crate::service::{AuthService, GameService, MatchPolicy, MatchmakingQueue};
use crate::ws::SessionHub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Game lifecycle and move commits.
    pub games: GameService,
    /// Rating-band waiting room.
    pub matchmaking: Arc<MatchmakingQueue>,
    /// Accounts and refresh credentials.
    pub auth: AuthService,
    /// Live session fan-out.
    pub hub: SessionHub,
    /// Access token validation for the bearer extractor and sessions.
    pub tokens: TokenService,
    /// Outbound frame buffer per session client.
    pub session_queue_capacity: usize,
}

impl AppState {
    /// Wires the services over one store that backs both games and users.
    #[must_use]
    pub fn new<S>(
        store: Arc<S>,
        tokens: TokenService,
        hub: SessionHub,
        session_queue_capacity: usize,
    ) -> Self
    where
        S: GameStore + UserStore + 'static,
    {
        let game_store: Arc<dyn GameStore> = Arc::clone(&store) as Arc<dyn GameStore>;
        let user_store: Arc<dyn UserStore> = store;
        let games = GameService::new(game_store);
        Self {
            matchmaking: Arc::new(MatchmakingQueue::new(games.clone(), MatchPolicy::default())),
            auth: AuthService::new(user_store, tokens.clone()),
            games,
            hub,
            tokens,
            session_queue_capacity,
        }
    }
}
