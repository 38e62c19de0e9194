//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::time::Duration;

use super::CrmscriptFetcher;

/// How long shutdown waits for cancelled fetches to settle
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl CrmscriptFetcher {
    /// Gracefully shut down the fetcher
    ///
    /// 1. Stops accepting new fetches and cancels running ones
    /// 2. Waits (up to 30 seconds) for them to settle; writes already in
    ///    progress finish first
    /// 3. Emits [`Event::Shutdown`]
    /// 4. Closes the registry's connection pool
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.orchestrator.cancel_all();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_fetches()).await {
            Ok(()) => tracing::info!("All active fetches settled"),
            Err(_) => {
                tracing::warn!("Timeout waiting for fetches to settle, proceeding with shutdown")
            }
        }

        let _ = self.event_tx.send(Event::Shutdown);

        self.db.pool().close().await;
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_active_fetches(&self) {
        loop {
            let active_count = self.orchestrator.active_count();
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active fetches to settle");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
