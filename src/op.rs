//! Mutation operation model and persistence wrappers.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{
    game::Player,
    types::{GameId, OpSeq, Pins, PlayerId},
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Register a player.
    CreatePlayer {
        /// Registered player.
        player: Player,
    },
    /// Open an empty game for a player.
    CreateGame {
        /// New game id.
        game_id: GameId,
        /// Owning player.
        player_id: PlayerId,
    },
    /// Append one roll to a game.
    Roll {
        /// Target game.
        game_id: GameId,
        /// Zero-based position of the roll within the game.
        index: u32,
        /// Pins knocked down.
        pins: Pins,
    },
}

impl Op {
    /// Game touched by this op, if any.
    pub fn game_id(&self) -> Option<GameId> {
        match self {
            Op::CreatePlayer { .. } => None,
            Op::CreateGame { game_id, .. } | Op::Roll { game_id, .. } => Some(*game_id),
        }
    }

    /// Pins knocked down, for roll ops.
    pub fn pins(&self) -> Option<Pins> {
        match self {
            Op::Roll { pins, .. } => Some(*pins),
            _ => None,
        }
    }

    /// Short tag stored next to the payload in the journal.
    pub fn kind(&self) -> &'static str {
        match self {
            Op::CreatePlayer { .. } => "player",
            Op::CreateGame { .. } => "game",
            Op::Roll { .. } => "roll",
        }
    }
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
