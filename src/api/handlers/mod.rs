//! REST endpoint handlers organized by resource.

pub mod auth;
pub mod games;
pub mod matchmaking;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(games::routes())
        .merge(matchmaking::routes())
}
