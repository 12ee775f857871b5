//! Matchmaking DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use super::game_dto::GameDto;

/// Response body for `POST /api/matchmaking/find`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindMatchResponse {
    /// `true` when the caller was paired immediately.
    pub matched: bool,
    /// The new game, when matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameDto>,
    /// 1-based queue position, when still waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Status text, when still waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response body for `GET /api/matchmaking/status`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    /// Whether the caller is waiting.
    pub in_queue: bool,
    /// 1-based queue position, when waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}
