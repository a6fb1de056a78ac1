//! Runtime event stream payloads.

use crate::types::{GameId, OpSeq, Pins, PlayerId};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A player was registered.
    PlayerCreated {
        /// New player id.
        id: PlayerId,
    },
    /// An empty game was opened.
    GameStarted {
        /// New game id.
        game_id: GameId,
        /// Owning player.
        player_id: PlayerId,
    },
    /// A roll was appended to a game.
    RollRecorded {
        /// Target game.
        game_id: GameId,
        /// Zero-based roll position.
        index: u32,
        /// Pins knocked down.
        pins: Pins,
    },
    /// The roll just recorded resolved the tenth frame.
    GameCompleted {
        /// Finished game.
        game_id: GameId,
        /// Final score.
        total: u32,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
