//! REST API layer: route handlers, DTOs, router composition and the
//! OpenAPI document.
//!
//! Resource endpoints live under `/api`; `/health` is mounted at the root.

pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;
use crate::error::{ErrorBody, ErrorResponse};
use crate::ws;

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "gambit-server",
        description = "Two-player online chess: accounts, games, matchmaking. Live play runs over the `/api/ws/games/{id}` duplex session."
    ),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::auth::update_avatar,
        handlers::games::create_game,
        handlers::games::list_games,
        handlers::games::get_game,
        handlers::games::join_game,
        handlers::games::game_history,
        handlers::games::export_pgn,
        handlers::matchmaking::find_match,
        handlers::matchmaking::cancel_match,
        handlers::matchmaking::queue_status,
        handlers::system::health_handler,
    ),
    components(schemas(ErrorResponse, ErrorBody)),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Accounts and tokens"),
        (name = "Games", description = "Game lifecycle and history"),
        (name = "Matchmaking", description = "Rating-band pairing"),
        (name = "System", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;

#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Builds the REST router with all endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the complete application: REST (with request timeout), duplex
/// sessions, Swagger UI when enabled, tracing and CORS.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    let rest = build_router().layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        request_timeout,
    ));
    let app = Router::new().merge(rest).merge(ws::routes());

    #[cfg(feature = "swagger-ui")]
    let app = app.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}
