//! # gambit-server
//!
//! Authoritative server core for turn-based two-player online chess.
//!
//! The crate validates and commits moves against the stored position,
//! settles Elo ratings when a game ends, fans committed moves out to every
//! live session on the game, and pairs waiting players by rating band.
//! Chess rules are delegated to `shakmaty`; this service owns ordering,
//! persistence and delivery.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)          ── AuthService, MatchmakingQueue
//!     ├── Session endpoint (ws/)        ── SessionHub fan-out
//!     │
//!     ├── GameService (service/)        ── the atomic move commit
//!     ├── ChessEngine (chess/)          ── rules, terminal detection, PGN
//!     ├── Elo (domain/rating)
//!     │
//!     └── GameStore / UserStore (persistence/)
//!             ├── PgStore (PostgreSQL)
//!             └── MemoryStore (tests)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod chess;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
