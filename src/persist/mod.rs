//! Journal sink abstraction and error types.

/// SQLite-backed journal sink.
pub mod sqlite;

use thiserror::Error;

use crate::{
    core::store::{StoreError, StoreSnapshotV1},
    op::StoredOp,
    types::OpSeq,
};

/// Failures while writing or replaying the journal.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite driver error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Payload encode/decode error.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// A journal row whose payload could not be decoded.
    #[error("event {seq} is unreadable: {reason}")]
    CorruptEvent {
        /// Sequence of the bad row.
        seq: OpSeq,
        /// Decoder message.
        reason: String,
    },
    /// Snapshot written by a newer format.
    #[error("unsupported snapshot version {0}")]
    UnsupportedSnapshot(u16),
    /// Replayed op rejected by the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Anything else, already rendered.
    #[error("{0}")]
    Message(String),
}

/// Result alias for persistence calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination for journaled store ops.
pub trait OpSink: Send {
    /// Appends ops in order, returning the highest sequence written.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    /// Makes previously appended ops durable.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
    /// Stores a snapshot that covers every op up to `last_seq`.
    fn write_snapshot(
        &mut self,
        _snapshot: &StoreSnapshotV1,
        _last_seq: OpSeq,
    ) -> PersistResult<()> {
        Ok(())
    }
    /// Drops ops up to and including `seq`, returning how many were removed.
    fn compact_through(&mut self, _seq: OpSeq) -> PersistResult<usize> {
        Ok(0)
    }
}
