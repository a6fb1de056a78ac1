use tempfile::TempDir;

use bowlscore::{
    core::store::{GameStore, StoreConfig, StoreError, ValidationError},
    persist::{sqlite::SqliteJournal, OpSink, PersistError},
    types::PinPolicy,
};

#[test]
fn sqlite_replay_round_trips_state_and_order() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("ops.db");

    let mut store = GameStore::new();
    let mut sink = SqliteJournal::open(&db_path).expect("open sqlite");

    let (a, _) = store.start_game("Dana").expect("start a");
    let (b, _) = store.start_game("Sam").expect("start b");
    let (_, _) = store.start_game("Dana").expect("start c");
    for pins in [10, 10, 4] {
        store.append_roll(a.game.id, pins).expect("roll a");
    }
    store.append_roll(b.game.id, 6).expect("roll b");

    let ops = store.drain_pending_ops();
    sink.append_ops(&ops).expect("append");
    assert_eq!(sink.latest_seq().expect("latest"), store.latest_op_seq());

    drop(sink);

    let sink2 = SqliteJournal::open(&db_path).expect("reopen");
    let replayed = sink2.load_store().expect("replay");

    assert_eq!(replayed.export_snapshot(), store.export_snapshot());
    assert_eq!(replayed.total_score(a.game.id).expect("score"), 24);
    assert_eq!(sink2.journaled_rolls(a.game.id).expect("rolls"), vec![10, 10, 4]);
}

#[test]
fn snapshot_and_compaction_preserve_replay() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("snap.db");

    let mut store = GameStore::new();
    let mut sink = SqliteJournal::open(&db_path).expect("open sqlite");

    let (started, _) = store.start_game("Dana").expect("start");
    for _ in 0..10 {
        store.append_roll(started.game.id, 5).expect("roll");
    }
    sink.append_ops(&store.drain_pending_ops()).expect("append");

    let snapshot = store.export_snapshot();
    let last_seq = store.latest_op_seq();
    sink.write_snapshot(&snapshot, last_seq).expect("snapshot");
    let removed = sink.compact_through(last_seq).expect("compact");
    assert!(removed > 0);

    for _ in 0..11 {
        store.append_roll(started.game.id, 5).expect("roll");
    }
    sink.append_ops(&store.drain_pending_ops()).expect("append tail");

    drop(sink);

    let reopened = SqliteJournal::open(&db_path).expect("reopen");
    let replayed = reopened.load_store().expect("replay");

    assert_eq!(replayed.export_snapshot(), store.export_snapshot());
    assert_eq!(replayed.total_score(started.game.id).expect("score"), 150);
    assert_eq!(reopened.journaled_rolls(started.game.id).expect("rolls").len(), 11);
}

#[test]
fn replay_keeps_recorded_rolls_under_strict_policy() {
    let mut store = GameStore::new();
    let mut sink = SqliteJournal::open_in_memory().expect("open sqlite");

    let (started, _) = store.start_game("Dana").expect("start");
    store.append_roll(started.game.id, 7).expect("roll");
    store.append_roll(started.game.id, 7).expect("roll");
    sink.append_ops(&store.drain_pending_ops()).expect("append");

    let mut replayed = sink
        .load_store_with_config(StoreConfig {
            pin_policy: PinPolicy::Strict,
        })
        .expect("replay");

    assert_eq!(replayed.list_rolls(started.game.id).expect("rolls"), &[7, 7]);
    assert_eq!(
        replayed.append_roll(started.game.id, 11).unwrap_err(),
        StoreError::Validation(ValidationError::TooManyPins { pins: 11, standing: 10 })
    );
}

#[test]
fn empty_journal_loads_empty_store() {
    let sink = SqliteJournal::open_in_memory().expect("open sqlite");
    assert_eq!(sink.latest_seq().expect("latest"), 0);

    let store = sink.load_store().expect("replay");
    assert!(store.ordered_game_ids().is_empty());
    assert_eq!(store.latest_op_seq(), 0);
}

#[test]
fn unreadable_payload_names_the_bad_event() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("corrupt.db");

    let mut store = GameStore::new();
    let mut sink = SqliteJournal::open(&db_path).expect("open sqlite");
    let (started, _) = store.start_game("Dana").expect("start");
    store.append_roll(started.game.id, 9).expect("roll");
    sink.append_ops(&store.drain_pending_ops()).expect("append");
    drop(sink);

    let raw = rusqlite::Connection::open(&db_path).expect("raw open");
    raw.execute("UPDATE events SET payload = x'7b' WHERE seq = 3", [])
        .expect("corrupt");
    drop(raw);

    let sink = SqliteJournal::open(&db_path).expect("reopen");
    let err = sink.load_store().unwrap_err();
    assert!(matches!(err, PersistError::CorruptEvent { seq: 3, .. }));
    assert_eq!(sink.journaled_rolls(started.game.id).expect("rolls"), vec![9]);
}

#[test]
fn op_from_a_newer_format_is_refused() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("newer_op.db");

    let mut store = GameStore::new();
    let mut sink = SqliteJournal::open(&db_path).expect("open sqlite");
    store.start_game("Dana").expect("start");
    sink.append_ops(&store.drain_pending_ops()).expect("append");
    drop(sink);

    let raw = rusqlite::Connection::open(&db_path).expect("raw open");
    let changed = raw
        .execute(
            "UPDATE events SET payload = CAST(replace(CAST(payload AS TEXT), \
             '\"format_version\":1', '\"format_version\":9') AS BLOB) WHERE seq = 2",
            [],
        )
        .expect("bump version");
    assert_eq!(changed, 1);
    drop(raw);

    let err = SqliteJournal::open(&db_path)
        .expect("reopen")
        .load_store()
        .unwrap_err();
    match err {
        PersistError::CorruptEvent { seq, reason } => {
            assert_eq!(seq, 2);
            assert!(reason.contains("unknown op format 9"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn snapshot_from_a_newer_format_is_refused() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("newer_snapshot.db");

    let mut store = GameStore::new();
    let mut sink = SqliteJournal::open(&db_path).expect("open sqlite");
    let (started, _) = store.start_game("Dana").expect("start");
    store.append_roll(started.game.id, 6).expect("roll");
    sink.append_ops(&store.drain_pending_ops()).expect("append");
    sink.write_snapshot(&store.export_snapshot(), store.latest_op_seq())
        .expect("snapshot");
    drop(sink);

    let raw = rusqlite::Connection::open(&db_path).expect("raw open");
    raw.execute(
        "UPDATE snapshots SET payload = CAST(replace(CAST(payload AS TEXT), \
         '\"version\":1', '\"version\":7') AS BLOB)",
        [],
    )
    .expect("bump version");
    drop(raw);

    let err = SqliteJournal::open(&db_path)
        .expect("reopen")
        .load_store()
        .unwrap_err();
    assert!(matches!(err, PersistError::UnsupportedSnapshot(7)), "{err}");
}
