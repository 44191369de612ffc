use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Integer minor currency units — the only money type.
pub type Cents = i64;

/// Length of one UTC day.
pub const DAY_MS: Ms = 86_400_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start <= end, "Span start must not be after end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    #[allow(dead_code)]
    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// The UTC day bucket containing `t`. Table seatings occupy whole days, so a
/// request timestamp anywhere within a day maps to the same span.
pub fn day_span(t: Ms) -> Span {
    let day_start = t - t.rem_euclid(DAY_MS);
    Span::new(day_start, day_start + DAY_MS)
}

/// Lifecycle of a booking. The only legal transition is Pending → Settled;
/// bookings are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Settled,
}

/// Variant-specific fields carried on a booking. Party size and contact
/// details are recorded as given; the ledger does not validate them against
/// resource capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingDetails {
    Room { adults: u32, children: u32 },
    Table { full_name: String, phone_number: String },
}

/// A reservation held by a guest on one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub guest_id: Ulid,
    pub span: Span,
    pub status: BookingStatus,
    pub details: BookingDetails,
    pub created_at: Ms,
}

impl Booking {
    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }

    /// Monotonic transition. Returns false if the booking was already
    /// settled; the status never moves back.
    pub fn mark_settled(&mut self) -> bool {
        match self.status {
            BookingStatus::Pending => {
                self.status = BookingStatus::Settled;
                true
            }
            BookingStatus::Settled => false,
        }
    }
}

/// All bookings on one resource, sorted by `span.start`. Settled bookings
/// stay in the book and keep blocking their span.
#[derive(Debug, Clone)]
pub struct ResourceBook {
    pub id: Ulid,
    pub bookings: Vec<Booking>,
}

impl ResourceBook {
    pub fn new(id: Ulid) -> Self {
        Self { id, bookings: Vec::new() }
    }

    /// Insert a booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Return only bookings whose span overlaps the query window.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        id: Ulid,
        resource_id: Ulid,
        guest_id: Ulid,
        span: Span,
        details: BookingDetails,
        created_at: Ms,
    },
    /// One record for the whole settlement batch; replay applies it whole.
    FolioSettled {
        guest_id: Ulid,
        booking_ids: Vec<Ulid>,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInfo {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub guest_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub status: BookingStatus,
}

/// One priced room stay on a folio statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLine {
    pub room_type: String,
    pub room_number: String,
    pub description: String,
    pub price: Cents,
    pub start_date: Ms,
    pub end_date: Ms,
}

/// One priced table seating on a folio statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableLine {
    pub table_type: String,
    pub table_number: String,
    pub price: Cents,
    pub date: Ms,
}

/// Itemized pending bookings for one guest, priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioStatement {
    pub guest_id: Ulid,
    pub rooms: Vec<RoomLine>,
    pub tables: Vec<TableLine>,
    pub total_room_price: Cents,
    pub total_table_price: Cents,
    pub total_amount: Cents,
}
