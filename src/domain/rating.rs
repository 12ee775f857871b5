//! Elo rating updates for finished games.

use super::{GameResult, PlayerResult};

/// Elo K-factor.
pub const K_FACTOR: f64 = 32.0;

/// Returns the expected score of a player rated `rating` against `opponent`.
#[must_use]
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent - rating) / 400.0))
}

/// Computes the post-game ratings of white and black.
///
/// Each side moves by `K * (actual - expected)`, rounded half away from zero
/// and floored at zero. An undecided result leaves both ratings unchanged.
#[must_use]
pub fn update(white: i32, black: i32, result: GameResult) -> (i32, i32) {
    let white_score = match result {
        GameResult::WhiteWins => 1.0,
        GameResult::BlackWins => 0.0,
        GameResult::Draw => 0.5,
        GameResult::None => return (white, black),
    };
    let black_score = 1.0 - white_score;

    let next = |rating: i32, opponent: i32, score: f64| -> i32 {
        let delta = K_FACTOR * (score - expected_score(rating, opponent));
        #[allow(clippy::cast_possible_truncation)]
        let updated = (f64::from(rating) + delta).round() as i32;
        updated.max(0)
    };

    (
        next(white, black, white_score),
        next(black, white, black_score),
    )
}

/// Splits a game result into per-seat results.
///
/// Returns `None` while the game is undecided.
#[must_use]
pub fn player_results(result: GameResult) -> Option<(PlayerResult, PlayerResult)> {
    match result {
        GameResult::WhiteWins => Some((PlayerResult::Win, PlayerResult::Loss)),
        GameResult::BlackWins => Some((PlayerResult::Loss, PlayerResult::Win)),
        GameResult::Draw => Some((PlayerResult::Draw, PlayerResult::Draw)),
        GameResult::None => None,
    }
}
