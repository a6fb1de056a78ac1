//! SQLite journal of store ops with periodic snapshots.
//!
//! Every op becomes one `events` row. Roll rows also carry their pin count
//! in a plain column so a game's throws can be read back without decoding
//! payloads. Snapshots hold the whole store as JSON and let replay skip
//! everything at or below their `last_seq`.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    core::store::{GameStore, StoreConfig, StoreSnapshotV1},
    op::{now_ms, StoredOp, StoredOpEnvelope, OP_FORMAT_VERSION},
    types::{GameId, OpSeq, Pins},
};

use super::{OpSink, PersistError, PersistResult};

const SNAPSHOT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotRecord<S> {
    version: u16,
    store: S,
}

/// Op journal and snapshot storage in a single SQLite database.
pub struct SqliteJournal {
    conn: Connection,
}

impl SqliteJournal {
    /// Opens or creates the journal database at `path`.
    ///
    /// Runs in WAL mode with `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        Self::prepare(Connection::open(path)?)
    }

    /// Journal that lives only as long as the value.
    pub fn open_in_memory() -> PersistResult<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> PersistResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    /// Rebuilds a store with the default policy.
    pub fn load_store(&self) -> PersistResult<GameStore> {
        self.load_store_with_config(StoreConfig::default())
    }

    /// Rebuilds a store from the newest snapshot and the events after it,
    /// then switches it to `config` for rolls recorded from now on.
    ///
    /// Journaled rolls are replayed as recorded, never re-validated.
    pub fn load_store_with_config(&self, config: StoreConfig) -> PersistResult<GameStore> {
        let mut store = match self.latest_snapshot()? {
            Some(snapshot) => GameStore::from_snapshot(snapshot)?,
            None => GameStore::new(),
        };

        let from_seq = store.latest_op_seq();
        let tail = self.load_events_after(from_seq)?;
        let replayed = tail.len();
        tail.into_iter()
            .try_for_each(|stored| store.apply_replayed_op(stored))?;
        store.set_config(config);

        info!(
            from_seq,
            replayed,
            games = store.ordered_game_ids().len(),
            "journal replayed"
        );
        Ok(store)
    }

    /// Journaled ops with a sequence above `seq`, in order.
    pub fn load_events_after(&self, seq: OpSeq) -> PersistResult<Vec<StoredOp>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT seq, ts_ms, payload FROM events WHERE seq > ?1 ORDER BY seq")?;
        let rows = stmt
            .query_map(params![seq as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)? as OpSeq,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(seq, ts_ms, payload)| {
                let mut stored = decode_op(seq, &payload)?;
                stored.seq = seq;
                stored.ts_ms = ts_ms;
                Ok(stored)
            })
            .collect()
    }

    /// Pins of every roll still in the journal for `game_id`, oldest first.
    ///
    /// Rolls folded into a snapshot and compacted away are not returned.
    pub fn journaled_rolls(&self, game_id: GameId) -> PersistResult<Vec<Pins>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT pins FROM events WHERE game_id = ?1 AND kind = 'roll' ORDER BY seq",
        )?;
        let pins = stmt
            .query_map(params![game_id as i64], |row| row.get::<_, i64>(0))?
            .map(|pins| pins.map(|p| p as Pins))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pins)
    }

    /// Stores `snapshot` as covering every op up to `last_seq`.
    pub fn write_snapshot(
        &mut self,
        snapshot: &StoreSnapshotV1,
        last_seq: OpSeq,
    ) -> PersistResult<()> {
        let payload = serde_json::to_vec(&SnapshotRecord {
            version: SNAPSHOT_VERSION,
            store: snapshot,
        })?;
        self.conn.execute(
            "INSERT INTO snapshots(last_seq, ts_ms, players, games, payload) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                last_seq as i64,
                now_ms() as i64,
                snapshot.players.len() as i64,
                snapshot.games.len() as i64,
                payload
            ],
        )?;
        debug!(last_seq, games = snapshot.games.len(), "snapshot written");
        Ok(())
    }

    /// Removes journal rows with `seq` at or below the given one.
    pub fn compact_through(&mut self, seq: OpSeq) -> PersistResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM events WHERE seq <= ?1", params![seq as i64])?;
        debug!(seq, removed, "journal compacted");
        Ok(removed)
    }

    /// Highest sequence in the events table, or 0 when it is empty.
    pub fn latest_seq(&self) -> PersistResult<OpSeq> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM events", [], |row| row.get(0))?;
        Ok(max.map_or(0, |seq| seq as OpSeq))
    }

    fn latest_snapshot(&self) -> PersistResult<Option<StoreSnapshotV1>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;

        payload
            .map(|bytes| {
                let record: SnapshotRecord<StoreSnapshotV1> = serde_json::from_slice(&bytes)?;
                if record.version != SNAPSHOT_VERSION {
                    return Err(PersistError::UnsupportedSnapshot(record.version));
                }
                Ok(record.store)
            })
            .transpose()
    }
}

fn insert_ops(tx: &Transaction<'_>, ops: &[StoredOp]) -> PersistResult<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO events(seq, ts_ms, kind, game_id, pins, payload) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for stored in ops {
        let payload = serde_json::to_vec(&StoredOpEnvelope::new(stored.clone()))?;
        stmt.execute(params![
            stored.seq as i64,
            stored.ts_ms as i64,
            stored.op.kind(),
            stored.op.game_id().map(|id| id as i64),
            stored.op.pins().map(i64::from),
            payload,
        ])?;
    }
    Ok(())
}

fn decode_op(seq: OpSeq, payload: &[u8]) -> PersistResult<StoredOp> {
    let envelope: StoredOpEnvelope =
        serde_json::from_slice(payload).map_err(|err| PersistError::CorruptEvent {
            seq,
            reason: err.to_string(),
        })?;
    if envelope.format_version != OP_FORMAT_VERSION {
        return Err(PersistError::CorruptEvent {
            seq,
            reason: format!("unknown op format {}", envelope.format_version),
        });
    }
    Ok(envelope.stored)
}

impl OpSink for SqliteJournal {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let Some(last) = ops.last() else {
            return self.latest_seq();
        };

        let tx = self.conn.transaction()?;
        insert_ops(&tx, ops)?;
        tx.commit()?;
        Ok(last.seq)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, last_seq: OpSeq) -> PersistResult<()> {
        SqliteJournal::write_snapshot(self, snapshot, last_seq)
    }

    fn compact_through(&mut self, seq: OpSeq) -> PersistResult<usize> {
        SqliteJournal::compact_through(self, seq)
    }
}
