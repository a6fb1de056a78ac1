//! Shared primitive IDs and game-state enums.

use serde::{Deserialize, Serialize};

/// Pins knocked down by a single roll.
pub type Pins = u16;
/// Monotonic player identifier.
pub type PlayerId = u64;
/// Monotonic game identifier.
pub type GameId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;

/// Pins in a full rack.
pub const ALL_PINS: Pins = 10;
/// Frames in a single game.
pub const FRAMES: usize = 10;
/// Rolls in a perfect game, the longest legal roll sequence.
pub const MAX_ROLLS: usize = 21;

/// Whether a game still accepts rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    /// The tenth frame is not resolved yet.
    InProgress,
    /// The tenth frame and its bonus rolls are recorded.
    Complete,
}

/// How the store treats pin counts before recording a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PinPolicy {
    /// Record every roll as given; scoring passes odd values through.
    #[default]
    Permissive,
    /// Reject rolls exceeding the standing pins or arriving after completion.
    Strict,
}
