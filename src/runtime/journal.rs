//! Background task that batches journal writes off the store loop.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot, Mutex},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::{
    core::store::StoreSnapshotV1,
    op::{Op, StoredOp},
    persist::{OpSink, PersistError, PersistResult},
    types::OpSeq,
};

use super::handle::{RuntimeConfig, RuntimeError};

/// Smallest queue that fits the ops of any single command.
pub(crate) const MIN_QUEUE_BOUND: usize = 2;

/// Progress reports sent back to the store loop.
pub(crate) type DurableRx = mpsc::UnboundedReceiver<PersistResult<OpSeq>>;

enum JournalMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<PersistResult<OpSeq>>,
    },
    Checkpoint {
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<PersistResult<()>>,
    },
    Shutdown {
        resp: oneshot::Sender<PersistResult<OpSeq>>,
    },
}

/// The store loop's end of the journal worker.
pub(crate) struct JournalLink {
    tx: mpsc::Sender<JournalMsg>,
}

impl JournalLink {
    /// Holds queue room for `count` ops without waiting.
    ///
    /// Reserve before touching the store: a command either gets every slot it
    /// needs or is rejected with nothing applied.
    pub(crate) fn reserve(&self, count: usize) -> Result<Slots<'_>, PersistError> {
        self.tx
            .try_reserve_many(count)
            .map(|permits| Slots { permits })
            .map_err(|err| {
                let reason = match err {
                    mpsc::error::TrySendError::Full(()) => "queue full",
                    mpsc::error::TrySendError::Closed(()) => "worker stopped",
                };
                PersistError::Message(format!("journal {reason}, {count} ops not queued"))
            })
    }

    /// Queues one op, waiting for room.
    pub(crate) async fn send(&self, stored: StoredOp) -> Result<(), RuntimeError> {
        self.tx
            .send(JournalMsg::Op(stored))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    pub(crate) async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        self.call(|resp| JournalMsg::Flush { resp }).await
    }

    pub(crate) async fn checkpoint(
        &self,
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
    ) -> Result<(), RuntimeError> {
        self.call(|resp| JournalMsg::Checkpoint {
            snapshot,
            last_seq,
            compact,
            resp,
        })
        .await
    }

    pub(crate) async fn shutdown(&self) -> Result<OpSeq, RuntimeError> {
        self.call(|resp| JournalMsg::Shutdown { resp }).await
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<PersistResult<T>>) -> JournalMsg,
    ) -> Result<T, RuntimeError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(make(resp))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        let out = rx.await.map_err(|_| RuntimeError::ChannelClosed)?;
        Ok(out?)
    }
}

/// Queue room reserved for the ops of one command.
pub(crate) struct Slots<'a> {
    permits: mpsc::PermitIterator<'a, JournalMsg>,
}

impl Slots<'_> {
    /// Sends `ops` through the reserved slots, in order.
    pub(crate) fn fill(mut self, ops: Vec<StoredOp>) {
        for stored in ops {
            match self.permits.next() {
                Some(permit) => permit.send(JournalMsg::Op(stored)),
                None => warn!(seq = stored.seq, "op produced without a reserved journal slot"),
            }
        }
    }
}

/// Starts the worker that owns `sink`.
pub(crate) fn spawn_journal(
    sink: Box<dyn OpSink>,
    config: &RuntimeConfig,
) -> (JournalLink, DurableRx) {
    let (tx, rx) = mpsc::channel(config.persist_queue_bound.max(MIN_QUEUE_BOUND));
    let (durable_tx, durable_rx) = mpsc::unbounded_channel();
    let worker = JournalWorker {
        sink: Arc::new(Mutex::new(sink)),
        pending: Vec::new(),
        durable: 0,
        durable_tx,
        batch_max_ops: config.batch_max_ops.max(1),
        flush_on_create: config.flush_on_create,
        latency: Duration::from_millis(config.batch_max_latency_ms),
    };
    tokio::spawn(worker.run(rx));
    (JournalLink { tx }, durable_rx)
}

struct JournalWorker {
    sink: Arc<Mutex<Box<dyn OpSink>>>,
    pending: Vec<StoredOp>,
    durable: OpSeq,
    durable_tx: mpsc::UnboundedSender<PersistResult<OpSeq>>,
    batch_max_ops: usize,
    flush_on_create: bool,
    latency: Duration,
}

impl JournalWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<JournalMsg>) {
        let mut deadline = Instant::now() + self.latency;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = self.write_pending(true).await;
                        break;
                    };

                    match msg {
                        JournalMsg::Op(stored) => {
                            let creates = !matches!(stored.op, Op::Roll { .. });
                            self.pending.push(stored);
                            let full = self.pending.len() >= self.batch_max_ops;
                            if full || (creates && self.flush_on_create) {
                                let _ = self.write_pending(true).await;
                                deadline = Instant::now() + self.latency;
                            }
                        }
                        JournalMsg::Flush { resp } => {
                            let out = self.write_pending(true).await.map(|()| self.durable);
                            let _ = resp.send(out);
                            deadline = Instant::now() + self.latency;
                        }
                        JournalMsg::Checkpoint { snapshot, last_seq, compact, resp } => {
                            let _ = resp.send(self.checkpoint(snapshot, last_seq, compact).await);
                            deadline = Instant::now() + self.latency;
                        }
                        JournalMsg::Shutdown { resp } => {
                            let out = self.write_pending(true).await.map(|()| self.durable);
                            let _ = resp.send(out);
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !self.pending.is_empty() => {
                    let _ = self.write_pending(false).await;
                    deadline = Instant::now() + self.latency;
                }
            }
        }

        debug!(durable = self.durable, "journal worker stopped");
    }

    /// Writes buffered ops; `sync` also asks the sink to make them durable.
    async fn write_pending(&mut self, sync: bool) -> PersistResult<()> {
        let batch = std::mem::take(&mut self.pending);
        let count = batch.len();
        let written = self
            .with_sink(move |sink| {
                let last = if batch.is_empty() {
                    None
                } else {
                    Some(sink.append_ops(&batch)?)
                };
                if sync {
                    sink.flush()?;
                }
                Ok(last)
            })
            .await;

        match written {
            Ok(None) => Ok(()),
            Ok(Some(last)) => {
                self.durable = self.durable.max(last);
                debug!(count, durable = self.durable, "journal batch written");
                let _ = self.durable_tx.send(Ok(self.durable));
                Ok(())
            }
            Err(err) => {
                let _ = self
                    .durable_tx
                    .send(Err(PersistError::Message(format!("{count} ops not written: {err}"))));
                Err(err)
            }
        }
    }

    async fn checkpoint(
        &mut self,
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
    ) -> PersistResult<()> {
        self.write_pending(true).await?;
        self.with_sink(move |sink| {
            sink.write_snapshot(&snapshot, last_seq)?;
            if compact {
                sink.compact_through(last_seq)?;
            }
            Ok(())
        })
        .await
    }

    async fn with_sink<T, F>(&self, job: F) -> PersistResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn OpSink) -> PersistResult<T> + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || {
            let mut guard = sink.blocking_lock();
            job(&mut **guard)
        })
        .await
        .map_err(|err| PersistError::Message(format!("journal task failed: {err}")))?
    }
}
