//! Server error type with HTTP status code mapping.
//!
//! [`ServerError`] is the closed error taxonomy of the server. Each variant
//! maps to a numeric code and an HTTP status; session frames reuse the
//! display text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::chess::RulesError;
use crate::domain::{GameId, UserId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "not your turn",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status                  |
/// |-----------|------------------|------------------------------|
/// | 1000–1999 | Validation       | 400 Bad Request              |
/// | 2000–2999 | State/Not Found  | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server           | 500 Internal Server Error    |
/// | 4000–4999 | Rules            | 422 Unprocessable Entity     |
/// | 5000–5999 | Identity         | 401 Unauthorized / 403       |
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Game with the given id does not exist.
    #[error("game not found: {0}")]
    GameNotFound(GameId),

    /// User with the given id does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The caller holds neither seat of the game.
    #[error("you are not a player in this game")]
    NotAParticipant,

    /// The caller's color is not the side to move.
    #[error("not your turn")]
    NotYourTurn,

    /// The move text is not well-formed UCI.
    #[error("invalid move syntax: {0}")]
    InvalidMoveSyntax(String),

    /// The move is not legal in the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// The game already has a result.
    #[error("game is already over")]
    GameAlreadyTerminal,

    /// The game cannot be joined by this caller.
    #[error("game is not joinable: {0}")]
    GameNotJoinable(String),

    /// A move was submitted before an opponent joined.
    #[error("game has not started")]
    GameNotStarted,

    /// Missing, malformed or expired token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Email/password pair did not match.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A unique value (username, email) is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Storage layer failure; the surrounding transaction was rolled back.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidMoveSyntax(_) => 1002,
            Self::GameNotJoinable(_) => 1003,
            Self::GameNotFound(_) => 2001,
            Self::UserNotFound(_) => 2002,
            Self::NotYourTurn => 2003,
            Self::GameAlreadyTerminal => 2004,
            Self::GameNotStarted => 2005,
            Self::Conflict(_) => 2006,
            Self::Internal(_) => 3000,
            Self::Storage(_) => 3001,
            Self::IllegalMove(_) => 4001,
            Self::Unauthorized(_) => 5001,
            Self::InvalidCredentials => 5002,
            Self::NotAParticipant => 5003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidMoveSyntax(_) | Self::GameNotJoinable(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::GameNotFound(_) | Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotYourTurn
            | Self::GameAlreadyTerminal
            | Self::GameNotStarted
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::IllegalMove(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotAParticipant => StatusCode::FORBIDDEN,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for failures that end a duplex session instead of
    /// producing a private error frame.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Internal(_) | Self::Unauthorized(_)
        )
    }
}

impl From<RulesError> for ServerError {
    fn from(err: RulesError) -> Self {
        match err {
            RulesError::InvalidSyntax(uci) => Self::InvalidMoveSyntax(uci),
            RulesError::IllegalMove(uci) => Self::IllegalMove(uci),
            RulesError::GameAlreadyTerminal => Self::GameAlreadyTerminal,
            RulesError::InvalidPosition(why) => {
                Self::Internal(format!("stored position is invalid: {why}"))
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_rejections_map_to_client_errors() {
        assert_eq!(
            ServerError::InvalidMoveSyntax("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::IllegalMove("e2e5".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ServerError::NotYourTurn.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServerError::NotAParticipant.status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn only_infrastructure_and_identity_failures_are_session_fatal() {
        assert!(ServerError::Storage("down".into()).is_session_fatal());
        assert!(ServerError::Unauthorized("expired".into()).is_session_fatal());
        assert!(!ServerError::NotYourTurn.is_session_fatal());
        assert!(!ServerError::GameAlreadyTerminal.is_session_fatal());
    }

    #[test]
    fn rules_errors_convert() {
        assert!(matches!(
            ServerError::from(RulesError::InvalidSyntax("zz".into())),
            ServerError::InvalidMoveSyntax(_)
        ));
        assert!(matches!(
            ServerError::from(RulesError::InvalidPosition("bad".into())),
            ServerError::Internal(_)
        ));
    }

    #[test]
    fn error_codes_are_unique() {
        let all = [
            ServerError::GameNotFound(GameId::new(1)),
            ServerError::UserNotFound(UserId::new(1)),
            ServerError::NotAParticipant,
            ServerError::NotYourTurn,
            ServerError::InvalidMoveSyntax(String::new()),
            ServerError::IllegalMove(String::new()),
            ServerError::GameAlreadyTerminal,
            ServerError::GameNotJoinable(String::new()),
            ServerError::GameNotStarted,
            ServerError::Unauthorized(String::new()),
            ServerError::InvalidCredentials,
            ServerError::Conflict(String::new()),
            ServerError::InvalidRequest(String::new()),
            ServerError::Storage(String::new()),
            ServerError::Internal(String::new()),
        ];
        let mut codes: Vec<u32> = all.iter().map(ServerError::error_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn response_carries_status() {
        let response = ServerError::GameNotFound(GameId::new(9)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
