use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::auth::{may_create_bookings, Directory, Requester};
use crate::catalog::Catalog;
use crate::engine::{Ledger, LedgerError};
use crate::model::*;

// ── Requests ─────────────────────────────────────────────────────

/// One request frame. `op` selects the operation; dates are epoch
/// milliseconds; room and table numbers are the human-facing strings
/// printed on the door.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Authenticate {
        key: String,
    },
    BookRoom {
        room_number: String,
        start_date: Ms,
        end_date: Ms,
        number_adults: u32,
        number_child: u32,
    },
    BookTable {
        table_number: String,
        full_name: String,
        phone_number: String,
        date: Ms,
    },
    BookingSummary,
    SettlePayment,
}

// ── Responses ────────────────────────────────────────────────────

/// Acknowledgement for the write operations.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: &'static str,
}

/// `booking_summary` body. Field names follow the original guest-facing
/// API, so existing clients parse it unchanged.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub success: bool,
    /// The requester's id string.
    pub user: String,
    pub detailed_rooms: Vec<RoomLine>,
    pub detailed_tables: Vec<TableLine>,
    pub total_room_price: Cents,
    pub total_table_price: Cents,
    pub total_amount: Cents,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ack(Ack),
    Summary(Summary),
}

/// Error frame sent to the client. `error` is the machine-readable kind,
/// `message` the guest-facing text.
#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
}

impl ErrorFrame {
    /// Session-layer violations (bad JSON, missing authenticate).
    pub fn protocol(message: impl Into<String>) -> Self {
        Self { success: false, error: "protocol", message: message.into() }
    }
}

impl From<&ApiError> for ErrorFrame {
    fn from(e: &ApiError) -> Self {
        Self { success: false, error: e.kind(), message: e.message().to_string() }
    }
}

// ── Errors ───────────────────────────────────────────────────────

/// Service-level rejection. Carries the exact client-facing message; the
/// kind feeds the wire error frame and the metrics status label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InvalidInterval(&'static str),
    Conflict(&'static str),
    NotFound(&'static str),
    Authorization,
    Internal,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInterval(_) => "invalid_interval",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotFound(_) => "not_found",
            ApiError::Authorization => "authorization",
            ApiError::Internal => "internal",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::InvalidInterval(m)
            | ApiError::Conflict(m)
            | ApiError::NotFound(m) => m,
            ApiError::Authorization => "Access denied!",
            ApiError::Internal => "Internal server error",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for ApiError {}

const MSG_PAST_START: &str = "Invalid start date. Start date should be in the future.";
const MSG_BAD_RANGE: &str =
    "Invalid date range. End date should be greater than or equal to start date.";
const MSG_ROOM_CONFLICT: &str = "Room is booked in these dates";
const MSG_TABLE_CONFLICT: &str = "Table is not available on this date";
const MSG_GUEST_NOT_FOUND: &str = "Guest not found!";
const MSG_ROOM_NOT_FOUND: &str = "Room is not found";
const MSG_TABLE_NOT_FOUND: &str = "Table is not found";
const MSG_ROOM_BOOKED: &str = "Room is booked successfully";
const MSG_TABLE_BOOKED: &str = "Table is booked successfully";
const MSG_PAYMENT_OK: &str = "Payment successful";

// ── Service ──────────────────────────────────────────────────────

/// The public operations, wired over the injected collaborators. Every
/// call re-reads the requester from the directory, so a revoked account
/// fails closed even on an established session.
pub struct FolioService {
    directory: Arc<dyn Directory>,
    catalog: Arc<dyn Catalog>,
    ledger: Arc<Ledger>,
}

impl FolioService {
    pub fn new(
        directory: Arc<dyn Directory>,
        catalog: Arc<dyn Catalog>,
        ledger: Arc<Ledger>,
    ) -> Self {
        Self { directory, catalog, ledger }
    }

    pub async fn authenticate(&self, key: &str) -> Option<Ulid> {
        self.directory.authenticate(key).await
    }

    /// Execute one authenticated request.
    pub async fn execute(
        &self,
        requester_id: Ulid,
        req: Request,
    ) -> Result<Response, ApiError> {
        let requester = self
            .directory
            .find(requester_id)
            .await
            .ok_or(ApiError::NotFound(MSG_GUEST_NOT_FOUND))?;

        match req {
            // The session layer consumes authenticate frames before dispatch.
            Request::Authenticate { .. } => Err(ApiError::Internal),
            Request::BookRoom {
                room_number,
                start_date,
                end_date,
                number_adults,
                number_child,
            } => {
                self.book_room(
                    &requester,
                    &room_number,
                    start_date,
                    end_date,
                    number_adults,
                    number_child,
                )
                .await
            }
            Request::BookTable { table_number, full_name, phone_number, date } => {
                self.book_table(&requester, &table_number, full_name, phone_number, date)
                    .await
            }
            Request::BookingSummary => self.booking_summary(&requester).await,
            Request::SettlePayment => self.settle_payment(&requester).await,
        }
    }

    async fn book_room(
        &self,
        requester: &Requester,
        number: &str,
        start: Ms,
        end: Ms,
        adults: u32,
        children: u32,
    ) -> Result<Response, ApiError> {
        if !may_create_bookings(requester) {
            return Err(ApiError::Authorization);
        }
        let room = self
            .catalog
            .find_room(number)
            .await
            .ok_or(ApiError::NotFound(MSG_ROOM_NOT_FOUND))?;
        self.ledger
            .create_room_booking(room.id, requester.id, start, end, adults, children)
            .await
            .map_err(|e| booking_error(e, MSG_ROOM_CONFLICT))?;
        Ok(Response::Ack(Ack { success: true, message: MSG_ROOM_BOOKED }))
    }

    async fn book_table(
        &self,
        requester: &Requester,
        number: &str,
        full_name: String,
        phone_number: String,
        date: Ms,
    ) -> Result<Response, ApiError> {
        if !may_create_bookings(requester) {
            return Err(ApiError::Authorization);
        }
        let table = self
            .catalog
            .find_table(number)
            .await
            .ok_or(ApiError::NotFound(MSG_TABLE_NOT_FOUND))?;
        self.ledger
            .create_table_booking(table.id, requester.id, date, full_name, phone_number)
            .await
            .map_err(|e| booking_error(e, MSG_TABLE_CONFLICT))?;
        Ok(Response::Ack(Ack { success: true, message: MSG_TABLE_BOOKED }))
    }

    async fn booking_summary(&self, requester: &Requester) -> Result<Response, ApiError> {
        let statement = self
            .ledger
            .folio_statement(requester.id, self.catalog.as_ref())
            .await;
        Ok(Response::Summary(Summary {
            success: true,
            user: requester.id.to_string(),
            detailed_rooms: statement.rooms,
            detailed_tables: statement.tables,
            total_room_price: statement.total_room_price,
            total_table_price: statement.total_table_price,
            total_amount: statement.total_amount,
        }))
    }

    /// Settling an empty folio is a successful no-op.
    async fn settle_payment(&self, requester: &Requester) -> Result<Response, ApiError> {
        self.ledger.settle_folio(requester.id).await.map_err(|e| match e {
            LedgerError::LimitExceeded(msg) => ApiError::InvalidInterval(msg),
            other => internal_error(other),
        })?;
        Ok(Response::Ack(Ack { success: true, message: MSG_PAYMENT_OK }))
    }
}

/// Map ledger rejections onto the client-facing messages for the variant
/// being booked. Limit violations surface as invalid_interval with their
/// specific message.
fn booking_error(e: LedgerError, conflict_msg: &'static str) -> ApiError {
    match e {
        LedgerError::PastStart { .. } => ApiError::InvalidInterval(MSG_PAST_START),
        LedgerError::InvertedSpan { .. } => ApiError::InvalidInterval(MSG_BAD_RANGE),
        LedgerError::Conflict(_) => ApiError::Conflict(conflict_msg),
        LedgerError::LimitExceeded(msg) => ApiError::InvalidInterval(msg),
        other => internal_error(other),
    }
}

/// Log the full error server-side; the client sees only the generic text.
fn internal_error(e: LedgerError) -> ApiError {
    tracing::error!("ledger failure: {e}");
    ApiError::Internal
}
