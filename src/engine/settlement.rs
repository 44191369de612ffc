use std::collections::HashMap;

use ulid::Ulid;

use crate::catalog::{Catalog, ResourceKind};
use crate::limits::*;
use crate::model::*;

use super::{Ledger, LedgerError};

impl Ledger {
    /// Pending bookings of a guest, read under the involved books' read
    /// locks acquired in sorted order. A concurrent settlement holds all its
    /// write locks through the flip, so the snapshot sees the batch entirely
    /// or not at all — never a mixed state.
    pub async fn pending_bookings(&self, guest_id: Ulid) -> Vec<Booking> {
        let ids = self.store.bookings_of_guest(&guest_id);
        if ids.is_empty() {
            return Vec::new();
        }

        let mut resource_ids: Vec<Ulid> = ids
            .iter()
            .filter_map(|id| self.store.resource_of(id))
            .collect();
        resource_ids.sort_unstable();
        resource_ids.dedup();

        let mut guards = Vec::with_capacity(resource_ids.len());
        for rid in &resource_ids {
            if let Some(book) = self.store.get_book(rid) {
                guards.push(book.read_owned().await);
            }
        }

        let mut pending = Vec::new();
        for guard in &guards {
            for b in &guard.bookings {
                if b.guest_id == guest_id && b.is_pending() {
                    pending.push(b.clone());
                }
            }
        }
        // Ulids are time-ordered; the statement lists bookings as created.
        pending.sort_by_key(|b| b.id);
        pending
    }

    /// Itemized folio for a guest: every pending booking joined against the
    /// catalog, with per-variant subtotals. Read-only; the join runs after
    /// the book locks are released since resources are immutable reference
    /// data.
    pub async fn folio_statement(&self, guest_id: Ulid, catalog: &dyn Catalog) -> FolioStatement {
        let pending = self.pending_bookings(guest_id).await;

        let mut resource_ids: Vec<Ulid> = pending.iter().map(|b| b.resource_id).collect();
        resource_ids.sort_unstable();
        resource_ids.dedup();
        let resources = catalog.find_by_ids(&resource_ids).await;
        let by_id: HashMap<Ulid, &crate::catalog::Resource> =
            resources.iter().map(|r| (r.id, r)).collect();

        let mut rooms = Vec::new();
        let mut tables = Vec::new();
        let mut total_room_price: Cents = 0;
        let mut total_table_price: Cents = 0;

        for b in &pending {
            let Some(resource) = by_id.get(&b.resource_id) else {
                tracing::warn!(
                    booking = %b.id,
                    resource = %b.resource_id,
                    "booking references a resource missing from the catalog"
                );
                continue;
            };
            match resource.kind {
                ResourceKind::Room { .. } => {
                    rooms.push(RoomLine {
                        room_type: resource.class_name.clone(),
                        room_number: resource.number.clone(),
                        description: resource.description.clone(),
                        price: resource.price,
                        start_date: b.span.start,
                        end_date: b.span.end,
                    });
                    total_room_price += resource.price;
                }
                ResourceKind::Table { .. } => {
                    tables.push(TableLine {
                        table_type: resource.class_name.clone(),
                        table_number: resource.number.clone(),
                        price: resource.price,
                        date: b.span.start,
                    });
                    total_table_price += resource.price;
                }
            }
        }

        FolioStatement {
            guest_id,
            rooms,
            tables,
            total_room_price,
            total_table_price,
            total_amount: total_room_price + total_table_price,
        }
    }

    /// Settle a guest's folio: every pending booking flips to Settled in one
    /// transaction. Settling an empty folio is a no-op that writes nothing.
    /// Returns the ids that were settled by this call.
    pub async fn settle_folio(&self, guest_id: Ulid) -> Result<Vec<Ulid>, LedgerError> {
        let ids = self.store.bookings_of_guest(&guest_id);
        self.settle_batch(guest_id, ids).await
    }

    /// Settlement machinery shared with targeted callers: lock every
    /// involved book in sorted order, validate all members, then commit all
    /// with a single WAL record while the locks are still held. Unknown or
    /// foreign members abort with nothing changed.
    pub(crate) async fn settle_batch(
        &self,
        guest_id: Ulid,
        booking_ids: Vec<Ulid>,
    ) -> Result<Vec<Ulid>, LedgerError> {
        if booking_ids.is_empty() {
            return Ok(Vec::new());
        }
        if booking_ids.len() > MAX_SETTLE_BATCH {
            return Err(LedgerError::LimitExceeded("settlement batch too large"));
        }
        let _gate = self.compact_gate.read().await;

        // Acquire write locks in sorted order to prevent deadlocks.
        let mut resource_ids = Vec::with_capacity(booking_ids.len());
        for id in &booking_ids {
            let (rid, _) = self.resolve_booking(id)?;
            resource_ids.push(rid);
        }
        resource_ids.sort_unstable();
        resource_ids.dedup();

        let mut guards = Vec::with_capacity(resource_ids.len());
        for rid in &resource_ids {
            let book = self
                .store
                .get_book(rid)
                .ok_or(LedgerError::NotFound(*rid))?;
            guards.push(book.write_owned().await);
        }

        // Phase 1: validate every member under the locks.
        let mut members = Vec::with_capacity(booking_ids.len());
        for id in &booking_ids {
            let Some(b) = guards.iter().find_map(|g| g.booking(*id)) else {
                return Err(LedgerError::NotFound(*id));
            };
            if b.guest_id != guest_id {
                return Err(LedgerError::NotOwner(*id));
            }
            if b.is_pending() {
                members.push(*id);
            }
            // Already settled: a racing settlement converged first; skip.
        }
        if members.is_empty() {
            return Ok(Vec::new());
        }

        // Phase 2: one event for the whole batch, applied while every lock
        // is still held — no reader can observe a partially settled folio.
        let event = Event::FolioSettled {
            guest_id,
            booking_ids: members.clone(),
        };
        self.wal_append(&event).await?;
        for guard in guards.iter_mut() {
            self.store.apply_event(guard, &event);
        }
        metrics::histogram!(crate::observability::SETTLE_BATCH_SIZE)
            .record(members.len() as f64);
        Ok(members)
    }
}
