//! WebSocket layer: the session hub, frame codecs and per-game sessions.
//!
//! Players open `/api/ws/games/{id}?token=...` to follow a game and submit
//! moves. Committed moves are fanned out to every session on that game
//! through the [`SessionHub`].

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;

use axum::Router;
use axum::routing::get;

pub use hub::{DEFAULT_CLIENT_CAPACITY, SessionClient, SessionHub};
pub use messages::{ClientFrame, ServerFrame};

use crate::app_state::AppState;

/// Session routes, mounted without the REST timeout layer.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/ws/games/{id}", get(handler::session_handler))
}
