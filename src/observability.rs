use std::net::SocketAddr;

use crate::api::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total operations executed. Labels: op, status.
pub const OPS_TOTAL: &str = "folio_ops_total";

/// Histogram: operation latency in seconds. Labels: op.
pub const OP_DURATION_SECONDS: &str = "folio_op_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "folio_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "folio_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "folio_connections_rejected_total";

/// Counter: sessions refused at the authenticate step.
pub const AUTH_FAILURES_TOTAL: &str = "folio_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "folio_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "folio_wal_flush_batch_size";

/// Histogram: bookings flipped per settlement.
pub const SETTLE_BATCH_SIZE: &str = "folio_settle_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Request variant to a short label for metrics.
pub fn op_label(req: &Request) -> &'static str {
    match req {
        Request::Authenticate { .. } => "authenticate",
        Request::BookRoom { .. } => "book_room",
        Request::BookTable { .. } => "book_table",
        Request::BookingSummary => "booking_summary",
        Request::SettlePayment => "settle_payment",
    }
}
