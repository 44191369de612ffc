use crate::model::*;

use super::LedgerError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_span(span: &Span) -> Result<(), LedgerError> {
    use crate::limits::*;
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(LedgerError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_STAY_DURATION_MS {
        return Err(LedgerError::LimitExceeded("span too wide"));
    }
    Ok(())
}

/// Admission decision for a requested `[start, end)` against one resource's
/// book. Pure: reads only the snapshot it is given. Interval validity is
/// checked before conflicts; on success the validated span is returned.
pub(crate) fn check_admissible(
    book: &ResourceBook,
    start: Ms,
    end: Ms,
    now: Ms,
) -> Result<Span, LedgerError> {
    if start < now {
        return Err(LedgerError::PastStart { start, now });
    }
    if end < start {
        return Err(LedgerError::InvertedSpan { start, end });
    }
    let span = Span::new(start, end);
    validate_span(&span)?;
    // Settled bookings block exactly like pending ones; status never frees
    // a span. `overlapping` yields precisely the intersecting bookings.
    if let Some(existing) = book.overlapping(&span).next() {
        return Err(LedgerError::Conflict(existing.id));
    }
    Ok(span)
}
