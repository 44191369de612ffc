use std::collections::HashMap;

use tokio::sync::oneshot;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_admissible, now_ms};
use super::{Ledger, LedgerError, WalCommand};

impl Ledger {
    /// Book a room over `[start, end)`. Party size is recorded as given.
    pub async fn create_room_booking(
        &self,
        resource_id: Ulid,
        guest_id: Ulid,
        start: Ms,
        end: Ms,
        adults: u32,
        children: u32,
    ) -> Result<Booking, LedgerError> {
        let details = BookingDetails::Room { adults, children };
        self.admit_booking(resource_id, guest_id, start, end, details).await
    }

    /// Book a table for the UTC day containing `date`. Date equality between
    /// seatings degenerates to span intersection on the day bucket.
    pub async fn create_table_booking(
        &self,
        resource_id: Ulid,
        guest_id: Ulid,
        date: Ms,
        full_name: String,
        phone_number: String,
    ) -> Result<Booking, LedgerError> {
        if full_name.len() > MAX_NAME_LEN {
            return Err(LedgerError::LimitExceeded("full name too long"));
        }
        if phone_number.len() > MAX_PHONE_LEN {
            return Err(LedgerError::LimitExceeded("phone number too long"));
        }
        // day_span assumes an in-range date; reject before the bucket arithmetic.
        if date < MIN_VALID_TIMESTAMP_MS || date > MAX_VALID_TIMESTAMP_MS {
            return Err(LedgerError::LimitExceeded("timestamp out of range"));
        }
        let day = day_span(date);
        let details = BookingDetails::Table { full_name, phone_number };
        self.admit_booking(resource_id, guest_id, day.start, day.end, details).await
    }

    /// Admission and insert under one write lock: the conflict check and the
    /// new booking are a single atomic unit, so two racing requests for
    /// overlapping spans serialize and exactly one wins.
    async fn admit_booking(
        &self,
        resource_id: Ulid,
        guest_id: Ulid,
        start: Ms,
        end: Ms,
        details: BookingDetails,
    ) -> Result<Booking, LedgerError> {
        let _gate = self.compact_gate.read().await;
        let book = self.store.book_or_create(resource_id);
        let mut guard = book.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_RESOURCE {
            return Err(LedgerError::LimitExceeded("too many bookings on resource"));
        }

        let now = now_ms();
        let span = check_admissible(&guard, start, end, now)?;

        let id = Ulid::new();
        let event = Event::BookingCreated {
            id,
            resource_id,
            guest_id,
            span,
            details: details.clone(),
            created_at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        Ok(Booking {
            id,
            resource_id,
            guest_id,
            span,
            status: BookingStatus::Pending,
            details,
            created_at: now,
        })
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current books. Holds the compaction gate exclusively so
    /// no append can land between the snapshot and the file swap.
    pub async fn compact_wal(&self) -> Result<(), LedgerError> {
        let _gate = self.compact_gate.write().await;

        let mut events = Vec::new();
        let mut settled_by_guest: HashMap<Ulid, Vec<Ulid>> = HashMap::new();

        let mut book_ids = self.store.book_ids();
        book_ids.sort_unstable();
        for rid in &book_ids {
            let Some(book) = self.store.get_book(rid) else { continue };
            let guard = book.read().await;
            for b in &guard.bookings {
                events.push(Event::BookingCreated {
                    id: b.id,
                    resource_id: b.resource_id,
                    guest_id: b.guest_id,
                    span: b.span,
                    details: b.details.clone(),
                    created_at: b.created_at,
                });
                if b.status == BookingStatus::Settled {
                    settled_by_guest.entry(b.guest_id).or_default().push(b.id);
                }
            }
        }

        // Creations first, then one settlement batch per guest.
        let mut guests: Vec<Ulid> = settled_by_guest.keys().copied().collect();
        guests.sort_unstable();
        for guest_id in guests {
            let booking_ids = settled_by_guest.remove(&guest_id).unwrap_or_default();
            events.push(Event::FolioSettled { guest_id, booking_ids });
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| LedgerError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| LedgerError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| LedgerError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
