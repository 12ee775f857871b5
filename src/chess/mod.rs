//! Chess rules: move validation, terminal detection and PGN export.

pub mod engine;
pub mod pgn;

pub use engine::{
    AppliedMove, ChessEngine, Color, Outcome, RulesError, STARTING_FEN, TerminalReason,
};
pub use pgn::PgnExport;
