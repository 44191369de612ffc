use ulid::Ulid;

use crate::model::*;

use super::Ledger;

impl Ledger {
    /// All bookings on one resource, any status, ordered by span start.
    pub async fn resource_bookings(&self, resource_id: Ulid) -> Vec<BookingInfo> {
        let Some(book) = self.store.get_book(&resource_id) else {
            return Vec::new();
        };
        let guard = book.read().await;
        guard
            .bookings
            .iter()
            .map(|b| BookingInfo {
                id: b.id,
                resource_id,
                guest_id: b.guest_id,
                start: b.span.start,
                end: b.span.end,
                status: b.status,
            })
            .collect()
    }

    /// All bookings of one guest, any status. Per-book reads; for a
    /// settlement-consistent snapshot use `pending_bookings`.
    pub async fn guest_bookings(&self, guest_id: Ulid) -> Vec<BookingInfo> {
        let ids = self.store.bookings_of_guest(&guest_id);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok((resource_id, book)) = self.resolve_booking(&id) else {
                continue;
            };
            let guard = book.read().await;
            if let Some(b) = guard.booking(id) {
                out.push(BookingInfo {
                    id,
                    resource_id,
                    guest_id,
                    start: b.span.start,
                    end: b.span.end,
                    status: b.status,
                });
            }
        }
        out.sort_by_key(|b| b.id);
        out
    }
}
