use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::SharedResourceBook;

/// In-memory books and indexes behind the ledger. Callers acquire the book
/// lock before calling `apply_event`; the transaction boundary is visible at
/// the mutation call site, not buried here.
pub struct LedgerStore {
    books: DashMap<Ulid, SharedResourceBook>,
    booking_to_resource: DashMap<Ulid, Ulid>,
    guest_bookings: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            booking_to_resource: DashMap::new(),
            guest_bookings: DashMap::new(),
        }
    }

    // ── Books ────────────────────────────────────────────────

    pub fn get_book(&self, resource_id: &Ulid) -> Option<SharedResourceBook> {
        self.books.get(resource_id).map(|e| e.value().clone())
    }

    /// Book for `resource_id`, created empty on first use. The catalog owns
    /// resource existence; the ledger only shards bookings by resource.
    pub fn book_or_create(&self, resource_id: Ulid) -> SharedResourceBook {
        self.books
            .entry(resource_id)
            .or_insert_with(|| {
                std::sync::Arc::new(tokio::sync::RwLock::new(ResourceBook::new(resource_id)))
            })
            .value()
            .clone()
    }

    pub fn book_ids(&self) -> Vec<Ulid> {
        self.books.iter().map(|e| *e.key()).collect()
    }

    // ── Booking index ────────────────────────────────────────

    pub fn booking_count(&self) -> usize {
        self.booking_to_resource.len()
    }

    pub fn resource_of(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_resource.get(booking_id).map(|e| *e.value())
    }

    // ── Guest index ──────────────────────────────────────────

    pub fn bookings_of_guest(&self, guest_id: &Ulid) -> Vec<Ulid> {
        self.guest_bookings
            .get(guest_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // ── Event application ────────────────────────────────────

    /// Apply one event to one book (held exclusively by the caller). A
    /// settlement event may span several books; each application flips only
    /// the members that live in the given book.
    pub fn apply_event(&self, book: &mut ResourceBook, event: &Event) {
        match event {
            Event::BookingCreated {
                id,
                resource_id,
                guest_id,
                span,
                details,
                created_at,
            } => {
                if *resource_id != book.id {
                    return;
                }
                book.insert_booking(Booking {
                    id: *id,
                    resource_id: *resource_id,
                    guest_id: *guest_id,
                    span: *span,
                    status: BookingStatus::Pending,
                    details: details.clone(),
                    created_at: *created_at,
                });
                self.booking_to_resource.insert(*id, *resource_id);
                self.guest_bookings.entry(*guest_id).or_default().push(*id);
            }
            Event::FolioSettled { booking_ids, .. } => {
                for id in booking_ids {
                    if let Some(b) = book.booking_mut(*id) {
                        b.mark_settled();
                    }
                }
            }
        }
    }
}
