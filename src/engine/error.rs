use ulid::Ulid;

use crate::model::Ms;

#[derive(Debug)]
pub enum LedgerError {
    NotFound(Ulid),
    Conflict(Ulid),
    PastStart { start: Ms, now: Ms },
    InvertedSpan { start: Ms, end: Ms },
    NotOwner(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::NotFound(id) => write!(f, "not found: {id}"),
            LedgerError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            LedgerError::PastStart { start, now } => {
                write!(f, "start {start} is in the past (now {now})")
            }
            LedgerError::InvertedSpan { start, end } => {
                write!(f, "inverted span: end {end} before start {start}")
            }
            LedgerError::NotOwner(id) => write!(f, "booking {id} belongs to another guest"),
            LedgerError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            LedgerError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}
