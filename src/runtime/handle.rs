//! The task that owns the [`GameStore`] and the handle used to reach it.

use std::ops::ControlFlow;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{
    core::store::{GameStore, StoreError},
    engine::score,
    game::{GameRecord, Player, ScoreCard, StartedGame},
    op::{Op, StoredOp},
    persist::{OpSink, PersistError, PersistResult},
    types::{GameId, GameStatus, OpSeq, Pins, PlayerId},
};

use super::{
    events::GameEvent,
    journal::{spawn_journal, DurableRx, JournalLink, Slots},
};

/// Failures surfaced through a [`BowlingHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The store rejected the command.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Journal failure. For mutations the ops could not be queued and the
    /// store is left unchanged.
    #[error("persistence: {0}")]
    Persist(#[from] PersistError),
    /// The runtime task is gone.
    #[error("runtime channel closed")]
    ChannelClosed,
}

/// Tuning for the runtime loop and its persistence worker.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Flush immediately after player and game creation ops.
    pub flush_on_create: bool,
    /// Flush once this many ops are buffered.
    pub batch_max_ops: usize,
    /// Flush buffered ops at least this often.
    pub batch_max_latency_ms: u64,
    /// Capacity of the queue between the store loop and the worker; raised to 2
    /// when smaller so a new player and their game fit together.
    pub persist_queue_bound: usize,
    /// Take a snapshot after this many ops; 0 disables.
    pub snapshot_every_ops: usize,
    /// Delete journaled ops covered by each snapshot.
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_create: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
        }
    }
}

/// Cloneable handle to the single task that owns the [`GameStore`].
///
/// Every mutation and query is serialized through that task, so a score query
/// always observes a game either before or after a roll, never in between.
#[derive(Clone)]
pub struct BowlingHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<GameEvent>,
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    StartGame { name: String, resp: Reply<StartedGame> },
    CreateGame { player_id: PlayerId, resp: Reply<GameRecord> },
    FindPlayer { name: String, resp: oneshot::Sender<Option<Player>> },
    Roll { game_id: GameId, pins: Pins, resp: Reply<GameRecord> },
    Game { game_id: GameId, resp: oneshot::Sender<Option<GameRecord>> },
    GamesForPlayer { player_id: PlayerId, resp: oneshot::Sender<Vec<GameRecord>> },
    Score { game_id: GameId, resp: Reply<u32> },
    ScoreCard { game_id: GameId, resp: Reply<ScoreCard> },
    Flush { resp: Reply<OpSeq> },
    Checkpoint { resp: Reply<()> },
    Shutdown { resp: Reply<()> },
}

/// Moves `store` onto a new task and returns a handle to it.
///
/// With a `sink`, every op is forwarded to a journal worker that batches
/// writes; without one, ops are reported durable as soon as they apply.
/// Ops the store recorded before this call are journaled first.
pub fn spawn_bowling(
    store: GameStore,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> BowlingHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let (events_tx, _) = broadcast::channel(1024);

    let (journal, durable_rx) = match sink {
        Some(sink) => {
            let (link, durable_rx) = spawn_journal(sink, &config);
            (Some(link), Some(durable_rx))
        }
        None => (None, None),
    };

    let runtime = Runtime {
        store,
        events: events_tx.clone(),
        journal,
        config,
        ops_since_snapshot: 0,
    };
    tokio::spawn(runtime.run(cmd_rx, durable_rx));

    BowlingHandle { cmd_tx, events_tx }
}

impl BowlingHandle {
    /// Subscribes to runtime events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Opens a new game for `name`, registering the player on first use.
    pub async fn start_game(&self, name: impl Into<String>) -> Result<StartedGame, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::StartGame { name, resp }).await?
    }

    /// Opens a new game for an existing player.
    pub async fn create_game(&self, player_id: PlayerId) -> Result<GameRecord, RuntimeError> {
        self.request(|resp| Command::CreateGame { player_id, resp }).await?
    }

    /// Exact-name player lookup.
    pub async fn find_player(
        &self,
        name: impl Into<String>,
    ) -> Result<Option<Player>, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::FindPlayer { name, resp }).await
    }

    /// Appends a roll and returns the updated game.
    pub async fn roll(&self, game_id: GameId, pins: Pins) -> Result<GameRecord, RuntimeError> {
        self.request(|resp| Command::Roll { game_id, pins, resp }).await?
    }

    /// Game by id.
    pub async fn game(&self, game_id: GameId) -> Result<Option<GameRecord>, RuntimeError> {
        self.request(|resp| Command::Game { game_id, resp }).await
    }

    /// Games owned by a player in creation order.
    pub async fn games_for_player(
        &self,
        player_id: PlayerId,
    ) -> Result<Vec<GameRecord>, RuntimeError> {
        self.request(|resp| Command::GamesForPlayer { player_id, resp }).await
    }

    /// Current running total of a game.
    pub async fn score(&self, game_id: GameId) -> Result<u32, RuntimeError> {
        self.request(|resp| Command::Score { game_id, resp }).await?
    }

    /// Current score card of a game.
    pub async fn score_card(&self, game_id: GameId) -> Result<ScoreCard, RuntimeError> {
        self.request(|resp| Command::ScoreCard { game_id, resp }).await?
    }

    /// Waits until every applied op is durable and returns the highest sequence.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        self.request(|resp| Command::Flush { resp }).await?
    }

    /// Writes a snapshot of the current store through the sink.
    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Checkpoint { resp }).await?
    }

    /// Flushes pending ops and stops the runtime.
    ///
    /// Clones of this handle fail with [`RuntimeError::ChannelClosed`] afterwards.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await??;
        Ok(())
    }
}

enum Wake {
    Command(Option<Command>),
    Durable(Option<PersistResult<OpSeq>>),
}

struct Runtime {
    store: GameStore,
    events: broadcast::Sender<GameEvent>,
    journal: Option<JournalLink>,
    config: RuntimeConfig,
    ops_since_snapshot: usize,
}

impl Runtime {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut durable: Option<DurableRx>) {
        self.journal_backlog().await;

        loop {
            let wake = match durable.as_mut() {
                Some(reports) => tokio::select! {
                    cmd = commands.recv() => Wake::Command(cmd),
                    report = reports.recv() => Wake::Durable(report),
                },
                None => Wake::Command(commands.recv().await),
            };

            match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(cmd)) => {
                    if self.dispatch(cmd).await.is_break() {
                        break;
                    }
                }
                Wake::Durable(Some(Ok(op_seq))) => {
                    let _ = self.events.send(GameEvent::DurableUpTo { op_seq });
                }
                Wake::Durable(Some(Err(err))) => warn!(error = %err, "journal write failed"),
                Wake::Durable(None) => {
                    warn!("journal worker exited");
                    durable = None;
                }
            }
        }

        debug!("bowling runtime stopped");
    }

    async fn dispatch(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::StartGame { name, resp } => {
                let res = self.start_game(&name);
                self.after_write(res.is_ok()).await;
                let _ = resp.send(res);
            }
            Command::CreateGame { player_id, resp } => {
                let res = self.create_game(player_id);
                self.after_write(res.is_ok()).await;
                let _ = resp.send(res);
            }
            Command::Roll { game_id, pins, resp } => {
                let res = self.record_roll(game_id, pins);
                self.after_write(res.is_ok()).await;
                let _ = resp.send(res);
            }
            Command::FindPlayer { name, resp } => {
                let _ = resp.send(self.store.find_player_by_name(&name).cloned());
            }
            Command::Game { game_id, resp } => {
                let _ = resp.send(self.store.get_game_cloned(game_id));
            }
            Command::GamesForPlayer { player_id, resp } => {
                let games = self.store.games_for_player(player_id).into_iter().cloned().collect();
                let _ = resp.send(games);
            }
            Command::Score { game_id, resp } => {
                let _ = resp.send(self.store.total_score(game_id).map_err(RuntimeError::from));
            }
            Command::ScoreCard { game_id, resp } => {
                let _ = resp.send(self.store.score_card(game_id).map_err(RuntimeError::from));
            }
            Command::Flush { resp } => {
                let out = match &self.journal {
                    Some(journal) => journal.flush().await,
                    None => Ok(self.store.latest_op_seq()),
                };
                let _ = resp.send(out);
            }
            Command::Checkpoint { resp } => {
                let _ = resp.send(self.checkpoint().await);
            }
            Command::Shutdown { resp } => {
                let out = match &self.journal {
                    Some(journal) => journal.shutdown().await.map(|durable| {
                        info!(durable, "journal closed");
                    }),
                    None => Ok(()),
                };
                let _ = resp.send(out);
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    fn start_game(&mut self, name: &str) -> Result<StartedGame, RuntimeError> {
        let needed = match self.store.find_player_by_name(name) {
            Some(_) => 1,
            None => 2,
        };
        let slots = reserve(&self.journal, needed)?;
        let (started, ops) = self.store.start_game(name)?;
        publish(&self.events, slots, self.store.drain_pending_ops());

        for stored in ops {
            let event = match stored.op {
                Op::CreatePlayer { player } => GameEvent::PlayerCreated { id: player.id },
                Op::CreateGame { game_id, player_id } => {
                    GameEvent::GameStarted { game_id, player_id }
                }
                Op::Roll { .. } => continue,
            };
            let _ = self.events.send(event);
        }
        info!(
            player_id = started.player.id,
            game_id = started.game.id,
            "game started"
        );
        Ok(started)
    }

    fn create_game(&mut self, player_id: PlayerId) -> Result<GameRecord, RuntimeError> {
        let slots = reserve(&self.journal, 1)?;
        let (game, _) = self.store.create_game(player_id)?;
        publish(&self.events, slots, self.store.drain_pending_ops());
        let _ = self.events.send(GameEvent::GameStarted {
            game_id: game.id,
            player_id,
        });
        Ok(game)
    }

    fn record_roll(&mut self, game_id: GameId, pins: Pins) -> Result<GameRecord, RuntimeError> {
        // unknown games report as such even when the journal is backed up
        self.store.list_rolls(game_id)?;
        let slots = reserve(&self.journal, 1)?;
        let game = self.store.append_roll(game_id, pins)?.0.clone();
        publish(&self.events, slots, self.store.drain_pending_ops());

        let index = game.rolls.len().saturating_sub(1);
        debug!(game_id, index, pins, "roll recorded");
        let _ = self.events.send(GameEvent::RollRecorded {
            game_id,
            index: index as u32,
            pins,
        });

        if score::game_status(&game.rolls[..index]) == GameStatus::InProgress
            && score::game_status(&game.rolls) == GameStatus::Complete
        {
            let total = score::total_score(&game.rolls);
            info!(game_id, total, "game complete");
            let _ = self.events.send(GameEvent::GameCompleted { game_id, total });
        }

        Ok(game)
    }

    /// Journals ops the store recorded before the runtime took it over.
    async fn journal_backlog(&mut self) {
        let backlog = self.store.drain_pending_ops();
        let Some(journal) = &self.journal else {
            return;
        };
        let count = backlog.len();
        for stored in backlog {
            if let Err(err) = journal.send(stored).await {
                warn!(error = %err, count, "backlog not journaled");
                return;
            }
        }
        if count > 0 {
            debug!(count, "backlog queued");
        }
    }

    async fn after_write(&mut self, applied: bool) {
        if !applied {
            return;
        }
        self.ops_since_snapshot += 1;
        let every = self.config.snapshot_every_ops;
        if every == 0 || self.ops_since_snapshot < every || self.journal.is_none() {
            return;
        }
        if let Err(err) = self.checkpoint().await {
            warn!(error = %err, "automatic snapshot failed");
        }
        self.ops_since_snapshot = 0;
    }

    async fn checkpoint(&mut self) -> Result<(), RuntimeError> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        let last_seq = self.store.latest_op_seq();
        journal
            .checkpoint(self.store.export_snapshot(), last_seq, self.config.compact_after_snapshot)
            .await?;
        self.ops_since_snapshot = 0;
        info!(last_seq, "checkpoint written");
        Ok(())
    }
}

/// Journal room for the ops of one command; `None` when nothing is journaled.
fn reserve(journal: &Option<JournalLink>, count: usize) -> Result<Option<Slots<'_>>, RuntimeError> {
    Ok(journal.as_ref().map(|link| link.reserve(count)).transpose()?)
}

fn publish(events: &broadcast::Sender<GameEvent>, slots: Option<Slots<'_>>, ops: Vec<StoredOp>) {
    match slots {
        Some(slots) => slots.fill(ops),
        None => {
            if let Some(last) = ops.last() {
                let _ = events.send(GameEvent::DurableUpTo { op_seq: last.seq });
            }
        }
    }
}
