//! Rules adapter over `shakmaty`.
//!
//! [`ChessEngine`] wraps a position together with the state a FEN cannot
//! carry: the repetition history and the movetext written so far. Every
//! input failure is a typed [`RulesError`]; a rejected move leaves the
//! engine untouched.

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position};

/// FEN of the standard initial position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// PGN result tokens that may terminate a movetext.
const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Failures reported by the rules adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    /// The position encoding could not be parsed or is not a legal setup.
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    /// The move is not well-formed UCI.
    #[error("invalid move syntax: {0}")]
    InvalidSyntax(String),

    /// The move is well-formed but not legal in the position.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// The position is already terminal.
    #[error("game is already over")]
    GameAlreadyTerminal,
}

/// Side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// White pieces.
    White,
    /// Black pieces.
    Black,
}

impl Color {
    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl From<shakmaty::Color> for Color {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Self::White,
            shakmaty::Color::Black => Self::Black,
        }
    }
}

/// Terminal outcome of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// White won.
    WhiteWins,
    /// Black won.
    BlackWins,
    /// Drawn by rule.
    Draw,
}

/// Why a position is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// The side to move is mated; the other side won.
    Checkmate(Color),
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can mate.
    InsufficientMaterial,
    /// One hundred half-moves without a capture or pawn move.
    FiftyMoveRule,
    /// The same position occurred for the third time.
    ThreefoldRepetition,
}

impl TerminalReason {
    /// Maps the reason to the outcome it produces.
    #[must_use]
    pub const fn outcome(self) -> Outcome {
        match self {
            Self::Checkmate(Color::White) => Outcome::WhiteWins,
            Self::Checkmate(Color::Black) => Outcome::BlackWins,
            Self::Stalemate
            | Self::InsufficientMaterial
            | Self::FiftyMoveRule
            | Self::ThreefoldRepetition => Outcome::Draw,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkmate(_) => "checkmate",
            Self::Stalemate => "stalemate",
            Self::InsufficientMaterial => "insufficient_material",
            Self::FiftyMoveRule => "fifty_move_rule",
            Self::ThreefoldRepetition => "threefold_repetition",
        }
    }
}

/// A move accepted and played by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Normalized UCI notation.
    pub uci: String,
    /// SAN with check (`+`) or mate (`#`) suffix.
    pub san: String,
}

/// Position plus repetition history and movetext.
#[derive(Debug, Clone)]
pub struct ChessEngine {
    position: Chess,
    /// Repetition keys of every earlier position, oldest first.
    history: Vec<String>,
    movetext: String,
}

impl ChessEngine {
    /// Creates an engine at the standard starting position.
    #[must_use]
    pub fn new_initial() -> Self {
        Self {
            position: Chess::default(),
            history: Vec::new(),
            movetext: String::new(),
        }
    }

    /// Creates an engine from a FEN encoding.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidPosition`] if the text is not FEN or
    /// describes an impossible position.
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        Ok(Self {
            position: parse_position(fen)?,
            history: Vec::new(),
            movetext: String::new(),
        })
    }

    /// Seeds repetition detection with the positions that preceded the
    /// current one, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidPosition`] if any entry is not valid FEN.
    pub fn with_history<I, S>(mut self, earlier: I) -> Result<Self, RulesError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.history = earlier
            .into_iter()
            .map(|fen| parse_position(fen.as_ref()).map(|pos| repetition_key(&pos)))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    /// Resumes from previously written movetext. A trailing result token
    /// is dropped; it is re-derived from the position.
    #[must_use]
    pub fn with_notation_log(mut self, log: &str) -> Self {
        let mut text = log.trim();
        if let Some((head, last)) = text.rsplit_once(' ') {
            if RESULT_TOKENS.contains(&last) {
                text = head.trim_end();
            }
        } else if RESULT_TOKENS.contains(&text) {
            text = "";
        }
        self.movetext = text.to_string();
        self
    }

    /// Returns the side to move.
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.position.turn().into()
    }

    /// Checks a UCI move without playing it.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::GameAlreadyTerminal`] when the position is
    /// terminal, [`RulesError::InvalidSyntax`] for malformed input, and
    /// [`RulesError::IllegalMove`] when the move is not legal here.
    pub fn validate(&self, uci: &str) -> Result<(), RulesError> {
        self.resolve(uci).map(|_| ())
    }

    /// Validates and plays a UCI move.
    ///
    /// # Errors
    ///
    /// Same as [`ChessEngine::validate`]; the engine is unchanged on error.
    pub fn apply(&mut self, uci: &str) -> Result<AppliedMove, RulesError> {
        let m = self.resolve(uci)?;
        let san = San::from_move(&self.position, &m);
        let after = self
            .position
            .clone()
            .play(&m)
            .map_err(|_| RulesError::IllegalMove(uci.trim().to_string()))?;

        let suffix = if after.is_checkmate() {
            "#"
        } else if after.is_check() {
            "+"
        } else {
            ""
        };
        let san = format!("{san}{suffix}");
        self.append_notation(&san);

        let previous = std::mem::replace(&mut self.position, after);
        self.history.push(repetition_key(&previous));

        Ok(AppliedMove {
            uci: UciMove::from_move(&m, CastlingMode::Standard).to_string(),
            san,
        })
    }

    /// Returns the FEN of the current position.
    #[must_use]
    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// Returns the PGN movetext, terminated by the result token once the
    /// position is terminal.
    #[must_use]
    pub fn notation_log(&self) -> String {
        let token = match self.outcome() {
            Some(Outcome::WhiteWins) => "1-0",
            Some(Outcome::BlackWins) => "0-1",
            Some(Outcome::Draw) => "1/2-1/2",
            None => return self.movetext.clone(),
        };
        if self.movetext.is_empty() {
            token.to_string()
        } else {
            format!("{} {token}", self.movetext)
        }
    }

    /// Returns the terminal outcome, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.terminal_reason().map(TerminalReason::outcome)
    }

    /// Returns why the position is terminal, if it is.
    #[must_use]
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        if self.position.is_checkmate() {
            return Some(TerminalReason::Checkmate(self.side_to_move().opposite()));
        }
        if self.position.is_stalemate() {
            return Some(TerminalReason::Stalemate);
        }
        if self.position.is_insufficient_material() {
            return Some(TerminalReason::InsufficientMaterial);
        }
        if self.position.halfmoves() >= 100 {
            return Some(TerminalReason::FiftyMoveRule);
        }
        let current = repetition_key(&self.position);
        let seen = self.history.iter().filter(|key| **key == current).count();
        if seen + 1 >= 3 {
            return Some(TerminalReason::ThreefoldRepetition);
        }
        None
    }

    fn resolve(&self, uci: &str) -> Result<Move, RulesError> {
        if self.terminal_reason().is_some() {
            return Err(RulesError::GameAlreadyTerminal);
        }
        let text = uci.trim();
        let parsed: UciMove = text
            .parse()
            .map_err(|_| RulesError::InvalidSyntax(text.to_string()))?;
        let m = parsed
            .to_move(&self.position)
            .map_err(|_| RulesError::IllegalMove(text.to_string()))?;
        if !self.position.is_legal(&m) {
            return Err(RulesError::IllegalMove(text.to_string()));
        }
        Ok(m)
    }

    fn append_notation(&mut self, san: &str) {
        let number = self.position.fullmoves().get();
        let entry = match (self.side_to_move(), self.movetext.is_empty()) {
            (Color::White, _) => format!("{number}. {san}"),
            (Color::Black, true) => format!("{number}... {san}"),
            (Color::Black, false) => san.to_string(),
        };
        if !self.movetext.is_empty() {
            self.movetext.push(' ');
        }
        self.movetext.push_str(&entry);
    }
}

impl Default for ChessEngine {
    fn default() -> Self {
        Self::new_initial()
    }
}

fn parse_position(fen: &str) -> Result<Chess, RulesError> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| RulesError::InvalidPosition(format!("{e}")))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| RulesError::InvalidPosition(format!("{e}")))
}

/// Placement, side to move, castling rights and legal en-passant square.
fn repetition_key(position: &Chess) -> String {
    let fen = Fen::from_position(position.clone(), EnPassantMode::Legal).to_string();
    fen.split(' ').take(4).collect::<Vec<_>>().join(" ")
}
