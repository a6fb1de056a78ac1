//! Player and game records plus the derived frame views.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::types::{GameId, GameStatus, Pins, PlayerId};

/// A registered bowler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable player identifier.
    pub id: PlayerId,
    /// Unique display name.
    pub name: String,
}

/// Authoritative game record with its append-only roll history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Stable game identifier.
    pub id: GameId,
    /// Owning player.
    pub player_id: PlayerId,
    /// Recorded rolls, oldest first.
    pub rolls: Vec<Pins>,
}

/// Result of starting a game by player name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedGame {
    /// Existing or newly created player.
    pub player: Player,
    /// Freshly created, empty game.
    pub game: GameRecord,
}

/// Display encoding of a single roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    /// All pins down on a fresh rack.
    Strike,
    /// Roll that clears the remaining pins of a rack.
    Spare,
    /// Any other roll.
    Pins(Pins),
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Strike => f.write_str("X"),
            Mark::Spare => f.write_str("/"),
            Mark::Pins(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Mark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Mark::Pins(n) => serializer.serialize_u16(*n),
            _ => serializer.collect_str(self),
        }
    }
}

/// Transient per-frame view derived from a roll sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Frame number, 1 through 10.
    pub frame: u8,
    /// Display marks, one per roll belonging to the frame.
    pub rolls: Vec<Mark>,
    /// Raw pin counts behind `rolls`.
    #[serde(skip)]
    pub pins: Vec<Pins>,
    /// Game running total the frame is labelled with.
    ///
    /// Every frame of a breakdown carries the same value: the total across all
    /// determined frames. Use [`Frame::contribution`] or
    /// [`crate::engine::score::running_totals`] for per-frame values.
    pub score: u32,
    /// This frame's own points, `None` while look-ahead rolls are missing.
    #[serde(skip)]
    pub contribution: Option<u32>,
}

impl Frame {
    /// True while the frame's contribution depends on unrecorded rolls.
    pub fn is_pending(&self) -> bool {
        self.contribution.is_none()
    }
}

/// Everything a scoring query derives from a roll sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreCard {
    /// Sum of all determined frame contributions.
    pub total: u32,
    /// Completion state of the game.
    pub status: GameStatus,
    /// Frames that have at least one roll.
    pub frames: Vec<Frame>,
}
