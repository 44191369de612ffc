use crate::model::{Ms, DAY_MS};

/// Earliest accepted timestamp (Unix epoch).
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// Latest accepted timestamp (Jan 1, year 3000).
pub const MAX_VALID_TIMESTAMP_MS: Ms = 32_503_680_000_000;

/// Longest accepted stay or seating span.
pub const MAX_STAY_DURATION_MS: Ms = 366 * DAY_MS;

/// Most bookings held on a single resource.
pub const MAX_BOOKINGS_PER_RESOURCE: usize = 100_000;

/// Most bookings settled in one folio batch.
pub const MAX_SETTLE_BATCH: usize = 1_000;

/// Longest guest full name accepted on a table booking.
pub const MAX_NAME_LEN: usize = 256;

/// Longest phone number accepted on a table booking.
pub const MAX_PHONE_LEN: usize = 32;

/// Longest wire frame accepted from a client.
pub const MAX_LINE_LEN: usize = 64 * 1024;
