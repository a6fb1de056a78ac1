use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    engine::score,
    game::{GameRecord, Player, ScoreCard, StartedGame},
    op::{now_ms, Op, StoredOp},
    types::{GameId, OpSeq, PinPolicy, Pins, PlayerId},
};

use super::indices::GameIndex;

/// Roll rejected under [`PinPolicy::Strict`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// More pins than are standing on the current rack.
    #[error("roll of {pins} exceeds the {standing} pins standing")]
    TooManyPins {
        /// Pins claimed by the roll.
        pins: Pins,
        /// Pins actually standing.
        standing: Pins,
    },
    /// The tenth frame is already resolved.
    #[error("game {0} is already complete")]
    GameComplete(GameId),
}

/// Store lookup and mutation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No game with this id.
    #[error("game {0} not found")]
    GameNotFound(GameId),
    /// No player with this id.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    /// Player names are unique.
    #[error("player name {0:?} is already taken")]
    PlayerExists(String),
    /// Replayed game id collides with an existing game.
    #[error("game {0} already exists")]
    GameExists(GameId),
    /// Roll rejected by the pin policy.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Store behaviour knobs.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Validation applied to incoming rolls.
    pub pin_policy: PinPolicy,
}

/// Serializable image of a [`GameStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    /// Next player id to allocate.
    pub next_player_id: PlayerId,
    /// Next game id to allocate.
    pub next_game_id: GameId,
    /// Next op sequence to allocate.
    pub next_op_seq: OpSeq,
    /// Players ordered by id.
    pub players: Vec<Player>,
    /// Games in creation order, rolls included.
    pub games: Vec<GameRecord>,
}

/// Authoritative in-memory players, games and roll histories.
#[derive(Debug, Default)]
pub struct GameStore {
    config: StoreConfig,
    players: HashMap<PlayerId, Player>,
    by_name: HashMap<String, PlayerId>,
    games: HashMap<GameId, GameRecord>,
    order: Vec<GameId>,
    by_player: GameIndex<PlayerId>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
    next_player_id: PlayerId,
    next_game_id: GameId,
}

impl GameStore {
    /// Empty store with the default config.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Empty store with `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            next_op_seq: 1,
            next_player_id: 1,
            next_game_id: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store from a snapshot, using the default config.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_player_id: snapshot.next_player_id,
            next_game_id: snapshot.next_game_id,
            next_op_seq: snapshot.next_op_seq,
            ..Self::default()
        };

        for player in snapshot.players {
            store.insert_player(player)?;
        }
        for game in snapshot.games {
            store.insert_game(game)?;
        }

        Ok(store)
    }

    /// Captures the full store state.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by_key(|p| p.id);
        let games = self
            .order
            .iter()
            .filter_map(|id| self.games.get(id).cloned())
            .collect();

        StoreSnapshotV1 {
            next_player_id: self.next_player_id,
            next_game_id: self.next_game_id,
            next_op_seq: self.next_op_seq,
            players,
            games,
        }
    }

    /// Active config.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Replaces the active config.
    pub fn set_config(&mut self, config: StoreConfig) {
        self.config = config;
    }

    /// Registers a player under a unique name.
    pub fn create_player(&mut self, name: &str) -> Result<(Player, StoredOp), StoreError> {
        if self.by_name.contains_key(name) {
            return Err(StoreError::PlayerExists(name.to_string()));
        }

        let player = Player {
            id: self.next_player_id,
            name: name.to_string(),
        };
        let stored = self.apply_with_seq(Op::CreatePlayer { player: player.clone() }, None)?;
        self.pending_ops.push(stored.clone());
        Ok((player, stored))
    }

    /// Exact-name player lookup.
    pub fn find_player_by_name(&self, name: &str) -> Option<&Player> {
        self.by_name.get(name).and_then(|id| self.players.get(id))
    }

    /// Player by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Opens an empty game for an existing player.
    pub fn create_game(
        &mut self,
        player_id: PlayerId,
    ) -> Result<(GameRecord, StoredOp), StoreError> {
        if !self.players.contains_key(&player_id) {
            return Err(StoreError::PlayerNotFound(player_id));
        }

        let game_id = self.next_game_id;
        let stored = self.apply_with_seq(Op::CreateGame { game_id, player_id }, None)?;
        self.pending_ops.push(stored.clone());
        let game = self
            .games
            .get(&game_id)
            .cloned()
            .ok_or(StoreError::GameNotFound(game_id))?;
        Ok((game, stored))
    }

    /// Opens a new game for `name`, registering the player on first use.
    pub fn start_game(&mut self, name: &str) -> Result<(StartedGame, Vec<StoredOp>), StoreError> {
        let mut ops = Vec::with_capacity(2);
        let player = match self.find_player_by_name(name) {
            Some(existing) => existing.clone(),
            None => {
                let (created, stored) = self.create_player(name)?;
                ops.push(stored);
                created
            }
        };

        let (game, stored) = self.create_game(player.id)?;
        ops.push(stored);
        Ok((StartedGame { player, game }, ops))
    }

    /// Appends one roll to a game.
    ///
    /// Fails with [`StoreError::GameNotFound`] for unknown games. Pin counts are
    /// only checked under [`PinPolicy::Strict`].
    pub fn append_roll(
        &mut self,
        game_id: GameId,
        pins: Pins,
    ) -> Result<(&GameRecord, StoredOp), StoreError> {
        let rolls = self.list_rolls(game_id)?;
        if self.config.pin_policy == PinPolicy::Strict {
            check_roll(game_id, rolls, pins)?;
        }

        let index = rolls.len() as u32;
        let stored = self.apply_with_seq(Op::Roll { game_id, index, pins }, None)?;
        self.pending_ops.push(stored.clone());
        let game = self.games.get(&game_id).ok_or(StoreError::GameNotFound(game_id))?;
        Ok((game, stored))
    }

    /// Applies a journaled op, keeping its original sequence.
    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        self.apply_with_seq(stored.op, Some(stored.seq))?;
        Ok(())
    }

    /// Game by id.
    pub fn get_game(&self, id: GameId) -> Option<&GameRecord> {
        self.games.get(&id)
    }

    /// Owned copy of a game.
    pub fn get_game_cloned(&self, id: GameId) -> Option<GameRecord> {
        self.get_game(id).cloned()
    }

    /// Rolls of a game, oldest first.
    pub fn list_rolls(&self, id: GameId) -> Result<&[Pins], StoreError> {
        self.games
            .get(&id)
            .map(|g| g.rolls.as_slice())
            .ok_or(StoreError::GameNotFound(id))
    }

    /// Games owned by a player in creation order.
    pub fn games_for_player(&self, player_id: PlayerId) -> Vec<&GameRecord> {
        self.by_player
            .get(&player_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.games.get(id))
            .collect()
    }

    /// Running total of a game.
    pub fn total_score(&self, id: GameId) -> Result<u32, StoreError> {
        self.list_rolls(id).map(score::total_score)
    }

    /// Full score card of a game.
    pub fn score_card(&self, id: GameId) -> Result<ScoreCard, StoreError> {
        self.list_rolls(id).map(score::score_card)
    }

    /// Game ids in creation order.
    pub fn ordered_game_ids(&self) -> &[GameId] {
        &self.order
    }

    /// Takes ops recorded since the last drain.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Highest sequence allocated so far.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    /// Applies `op`, allocating a fresh sequence unless one is replayed.
    fn apply_with_seq(&mut self, op: Op, seq: Option<OpSeq>) -> Result<StoredOp, StoreError> {
        match &op {
            Op::CreatePlayer { player } => {
                self.insert_player(player.clone())?;
            }
            Op::CreateGame { game_id, player_id } => {
                self.insert_game(GameRecord {
                    id: *game_id,
                    player_id: *player_id,
                    rolls: Vec::new(),
                })?;
            }
            Op::Roll { game_id, pins, .. } => {
                self.games
                    .get_mut(game_id)
                    .ok_or(StoreError::GameNotFound(*game_id))?
                    .rolls
                    .push(*pins);
            }
        }

        let seq = match seq {
            Some(seq) => {
                self.bump_next_seq_from(seq);
                seq
            }
            None => self.take_next_op_seq(),
        };

        Ok(StoredOp {
            seq,
            ts_ms: now_ms(),
            op,
        })
    }

    fn insert_player(&mut self, player: Player) -> Result<(), StoreError> {
        if self.by_name.contains_key(&player.name) {
            return Err(StoreError::PlayerExists(player.name));
        }
        self.next_player_id = self.next_player_id.max(player.id.saturating_add(1));
        self.by_name.insert(player.name.clone(), player.id);
        self.players.insert(player.id, player);
        Ok(())
    }

    fn insert_game(&mut self, game: GameRecord) -> Result<(), StoreError> {
        if self.games.contains_key(&game.id) {
            return Err(StoreError::GameExists(game.id));
        }
        if !self.players.contains_key(&game.player_id) {
            return Err(StoreError::PlayerNotFound(game.player_id));
        }
        self.next_game_id = self.next_game_id.max(game.id.saturating_add(1));
        self.by_player.entry(game.player_id).or_default().push(game.id);
        self.order.push(game.id);
        self.games.insert(game.id, game);
        Ok(())
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        seq
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn check_roll(game_id: GameId, rolls: &[Pins], pins: Pins) -> Result<(), ValidationError> {
    let standing = score::pins_standing(rolls).ok_or(ValidationError::GameComplete(game_id))?;
    if pins > standing {
        return Err(ValidationError::TooManyPins { pins, standing });
    }
    Ok(())
}
