//! Data Transfer Objects for REST request/response serialization.
//!
//! Wire names are camelCase; ids are JSON numbers.

pub mod auth_dto;
pub mod common_dto;
pub mod game_dto;
pub mod matchmaking_dto;

pub use auth_dto::*;
pub use common_dto::*;
pub use game_dto::*;
pub use matchmaking_dto::*;
