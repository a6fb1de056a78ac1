use bowlscore::{
    core::store::{GameStore, StoreConfig, StoreError, ValidationError},
    op::Op,
    types::{GameStatus, PinPolicy},
};

fn strict_store() -> GameStore {
    GameStore::with_config(StoreConfig {
        pin_policy: PinPolicy::Strict,
    })
}

#[test]
fn start_game_registers_player_once() {
    let mut store = GameStore::new();

    let (first, ops) = store.start_game("Dana").unwrap();
    assert_eq!(first.player.id, 1);
    assert_eq!(first.game.id, 1);
    assert!(first.game.rolls.is_empty());
    assert_eq!(ops.len(), 2);
    assert!(matches!(ops[0].op, Op::CreatePlayer { .. }));
    assert!(matches!(ops[1].op, Op::CreateGame { game_id: 1, player_id: 1 }));

    let (second, ops) = store.start_game("Dana").unwrap();
    assert_eq!(second.player, first.player);
    assert_eq!(second.game.id, 2);
    assert_eq!(ops.len(), 1);

    let games: Vec<_> = store.games_for_player(1).into_iter().map(|g| g.id).collect();
    assert_eq!(games, vec![1, 2]);
    assert_eq!(store.find_player_by_name("Dana"), Some(&first.player));
    assert_eq!(store.find_player_by_name("Sam"), None);
}

#[test]
fn op_sequences_are_monotonic() {
    let mut store = GameStore::new();
    let (started, ops) = store.start_game("Dana").unwrap();
    let (_, roll_op) = store.append_roll(started.game.id, 4).unwrap();

    assert_eq!((ops[0].seq, ops[1].seq, roll_op.seq), (1, 2, 3));
    assert_eq!(store.latest_op_seq(), 3);
    assert_eq!(store.drain_pending_ops().len(), 3);
    assert!(store.drain_pending_ops().is_empty());
}

#[test]
fn rolls_append_in_order_and_rescore() {
    let mut store = GameStore::new();
    let (started, _) = store.start_game("Dana").unwrap();
    let id = started.game.id;

    for pins in [10, 7, 3, 9, 0] {
        store.append_roll(id, pins).unwrap();
    }

    assert_eq!(store.list_rolls(id).unwrap(), &[10, 7, 3, 9, 0]);
    assert_eq!(store.total_score(id).unwrap(), 48);

    let card = store.score_card(id).unwrap();
    assert_eq!(card.total, 48);
    assert_eq!(card.status, GameStatus::InProgress);
    assert_eq!(card.frames.len(), 3);
}

#[test]
fn unknown_ids_are_reported() {
    let mut store = GameStore::new();

    assert_eq!(store.append_roll(9, 3).unwrap_err(), StoreError::GameNotFound(9));
    assert_eq!(store.list_rolls(9).unwrap_err(), StoreError::GameNotFound(9));
    assert_eq!(store.total_score(9).unwrap_err(), StoreError::GameNotFound(9));
    assert_eq!(store.create_game(4).unwrap_err(), StoreError::PlayerNotFound(4));
    assert!(store.drain_pending_ops().is_empty());
}

#[test]
fn player_names_are_unique() {
    let mut store = GameStore::new();
    store.create_player("Dana").unwrap();
    assert_eq!(
        store.create_player("Dana").unwrap_err(),
        StoreError::PlayerExists("Dana".to_string())
    );
}

#[test]
fn permissive_policy_records_impossible_frames() {
    let mut store = GameStore::new();
    let (started, _) = store.start_game("Dana").unwrap();
    let id = started.game.id;

    store.append_roll(id, 7).unwrap();
    store.append_roll(id, 7).unwrap();
    store.append_roll(id, 11).unwrap();

    assert_eq!(store.list_rolls(id).unwrap(), &[7, 7, 11]);
    assert_eq!(store.total_score(id).unwrap(), 14);
}

#[test]
fn strict_policy_rejects_what_permissive_accepts() {
    let mut store = strict_store();
    let (started, _) = store.start_game("Dana").unwrap();
    let id = started.game.id;

    assert_eq!(
        store.append_roll(id, 11).unwrap_err(),
        StoreError::Validation(ValidationError::TooManyPins { pins: 11, standing: 10 })
    );

    store.append_roll(id, 7).unwrap();
    assert_eq!(
        store.append_roll(id, 7).unwrap_err(),
        StoreError::Validation(ValidationError::TooManyPins { pins: 7, standing: 3 })
    );
    store.append_roll(id, 3).unwrap();
    assert_eq!(store.list_rolls(id).unwrap(), &[7, 3]);
}

#[test]
fn strict_policy_closes_finished_games() {
    let mut store = strict_store();
    let (started, _) = store.start_game("Dana").unwrap();
    let id = started.game.id;

    for _ in 0..12 {
        store.append_roll(id, 10).unwrap();
    }
    assert_eq!(store.score_card(id).unwrap().status, GameStatus::Complete);
    assert_eq!(store.total_score(id).unwrap(), 300);
    assert_eq!(
        store.append_roll(id, 0).unwrap_err(),
        StoreError::Validation(ValidationError::GameComplete(id))
    );
}

#[test]
fn snapshot_round_trips() {
    let mut store = GameStore::new();
    let (a, _) = store.start_game("Dana").unwrap();
    let (b, _) = store.start_game("Sam").unwrap();
    store.append_roll(a.game.id, 10).unwrap();
    store.append_roll(b.game.id, 4).unwrap();

    let snapshot = store.export_snapshot();
    let mut restored = GameStore::from_snapshot(snapshot.clone()).unwrap();
    assert_eq!(restored.export_snapshot(), snapshot);

    let (c, ops) = restored.start_game("Dana").unwrap();
    assert_eq!(c.player.id, a.player.id);
    assert_eq!(c.game.id, 3);
    assert_eq!(ops[0].seq, store.latest_op_seq() + 1);
}
