use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Ledger;

/// One compactor pass: rewrite the WAL if enough appends accumulated.
/// Returns true when a compaction ran.
pub async fn compact_if_due(ledger: &Ledger, threshold: u64) -> bool {
    let appends = ledger.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    info!("compacting WAL after {appends} appends");
    match ledger.compact_wal().await {
        Ok(()) => true,
        Err(e) => {
            // The log keeps growing but stays correct; retry next tick.
            tracing::warn!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that periodically checks whether the WAL is due for
/// compaction.
pub async fn run_compactor(ledger: Arc<Ledger>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        compact_if_due(&ledger, threshold).await;
    }
}
