//! PGN export.
//!
//! Only writing is supported; stored movetext is emitted as-is under a
//! Seven Tag Roster header block.

use std::fmt::Write as _;

use chrono::NaiveDate;

/// Value written for unknown tag values.
const UNKNOWN: &str = "?";

/// Header values and movetext for one exported game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnExport {
    /// `Event` tag.
    pub event: String,
    /// `Site` tag.
    pub site: String,
    /// Game start date.
    pub date: Option<NaiveDate>,
    /// `Round` tag.
    pub round: String,
    /// White player's name.
    pub white: Option<String>,
    /// Black player's name.
    pub black: Option<String>,
    /// Result token (`1-0`, `0-1`, `1/2-1/2` or `*`).
    pub result: String,
    /// White rating at export time.
    pub white_elo: Option<i32>,
    /// Black rating at export time.
    pub black_elo: Option<i32>,
    /// Seconds per player.
    pub time_control: Option<i32>,
    /// Movetext, possibly already terminated by a result token.
    pub movetext: String,
}

impl PgnExport {
    /// Renders the game as PGN text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let date = self
            .date
            .map_or_else(|| "????.??.??".to_string(), |d| d.format("%Y.%m.%d").to_string());

        push_tag(&mut out, "Event", &self.event);
        push_tag(&mut out, "Site", &self.site);
        push_tag(&mut out, "Date", &date);
        push_tag(&mut out, "Round", &self.round);
        push_tag(&mut out, "White", self.white.as_deref().unwrap_or(UNKNOWN));
        push_tag(&mut out, "Black", self.black.as_deref().unwrap_or(UNKNOWN));
        push_tag(&mut out, "Result", &self.result);
        if let Some(elo) = self.white_elo {
            push_tag(&mut out, "WhiteElo", &elo.to_string());
        }
        if let Some(elo) = self.black_elo {
            push_tag(&mut out, "BlackElo", &elo.to_string());
        }
        if let Some(seconds) = self.time_control {
            push_tag(&mut out, "TimeControl", &seconds.to_string());
        }
        out.push('\n');

        let movetext = self.movetext.trim();
        if movetext.is_empty() {
            out.push_str(&self.result);
        } else if movetext.ends_with(self.result.as_str()) {
            out.push_str(movetext);
        } else {
            let _ = write!(out, "{movetext} {}", self.result);
        }
        out.push('\n');
        out
    }
}

fn push_tag(out: &mut String, name: &str, value: &str) {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    let _ = writeln!(out, "[{name} \"{escaped}\"]");
}
