mod conflict;
mod error;
mod mutations;
mod queries;
mod settlement;
mod store;

pub use error::LedgerError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

use store::LedgerStore;

pub type SharedResourceBook = Arc<RwLock<ResourceBook>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking ledger: durable system of record for room and table bookings.
/// Bookings are sharded into per-resource books; each mutation acquires the
/// book's write lock, so admission check and insert are one atomic unit.
pub struct Ledger {
    pub(super) store: LedgerStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared; compaction holds it exclusively so no
    /// append can land between its state snapshot and the WAL file swap.
    pub(super) compact_gate: RwLock<()>,
}

impl Ledger {
    pub fn new(wal_path: PathBuf) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let ledger = Self {
            store: LedgerStore::new(),
            wal_tx,
            compact_gate: RwLock::new(()),
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            match event {
                Event::BookingCreated { resource_id, .. } => {
                    let book = ledger.store.book_or_create(*resource_id);
                    let mut guard = book.try_write().expect("replay: uncontended write");
                    ledger.store.apply_event(&mut guard, event);
                }
                Event::FolioSettled { booking_ids, .. } => {
                    let mut resources: Vec<Ulid> = booking_ids
                        .iter()
                        .filter_map(|id| ledger.store.resource_of(id))
                        .collect();
                    resources.sort_unstable();
                    resources.dedup();
                    for rid in resources {
                        if let Some(book) = ledger.store.get_book(&rid) {
                            let mut guard = book.try_write().expect("replay: uncontended write");
                            ledger.store.apply_event(&mut guard, event);
                        }
                    }
                }
            }
        }

        Ok(ledger)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), LedgerError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| LedgerError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| LedgerError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| LedgerError::WalError(e.to_string()))
    }

    /// WAL-append + apply in one call. The caller holds the book's write
    /// lock; in-memory state changes only after the append is acknowledged.
    pub(super) async fn persist_and_apply(
        &self,
        book: &mut ResourceBook,
        event: &Event,
    ) -> Result<(), LedgerError> {
        self.wal_append(event).await?;
        self.store.apply_event(book, event);
        Ok(())
    }

    /// Lookup booking → its resource's book.
    pub(super) fn resolve_booking(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, SharedResourceBook), LedgerError> {
        let resource_id = self
            .store
            .resource_of(booking_id)
            .ok_or(LedgerError::NotFound(*booking_id))?;
        let book = self
            .store
            .get_book(&resource_id)
            .ok_or(LedgerError::NotFound(resource_id))?;
        Ok((resource_id, book))
    }

    /// Total bookings ever recorded (settled ones included).
    pub fn booking_count(&self) -> usize {
        self.store.booking_count()
    }

    /// Point the ledger at a closed WAL channel so every later append fails.
    /// Simulates losing the log device mid-flight.
    #[cfg(test)]
    pub(crate) fn sever_wal(&mut self) {
        let (tx, _) = mpsc::channel(1);
        self.wal_tx = tx;
    }
}
