//! The [`CrmscriptFetcher`] facade, split into focused submodules.
//!
//! Methods are organized by domain:
//! - [`tenants`] - Tenant registry operations and legacy settings import
//! - [`fetch`] - Running and cancelling fetches
//! - [`script`] - The fetcher script template installed on tenants
//! - [`lifecycle`] - Shutdown coordination

mod fetch;
mod lifecycle;
mod script;
mod tenants;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::orchestrator::FetchOrchestrator;
use crate::remote::{HttpRemoteSource, RemoteSource};
use crate::types::Event;
use std::sync::Arc;

/// Main fetcher instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct CrmscriptFetcher {
    /// Tenant registry
    pub(crate) db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Runs fetches and tracks the running ones
    pub(crate) orchestrator: Arc<FetchOrchestrator>,
}

impl CrmscriptFetcher {
    /// Create a fetcher talking to tenants over HTTP
    ///
    /// Opens (or creates) the tenant registry and runs its migrations.
    pub async fn new(config: Config) -> Result<Self> {
        let remote = HttpRemoteSource::new(&config.fetch)?;
        Self::with_remote(config, Arc::new(remote)).await
    }

    /// Create a fetcher using a custom [`RemoteSource`]
    pub async fn with_remote(config: Config, remote: Arc<dyn RemoteSource>) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.database_path).await?;

        // Buffer large enough for a full fetch of every category several times over
        let (event_tx, _rx) = tokio::sync::broadcast::channel(256);

        let orchestrator = FetchOrchestrator::new(
            remote,
            config.fetch.clone(),
            config.retry.clone(),
            event_tx.clone(),
        );

        tracing::info!(
            database = %config.database_path.display(),
            max_concurrent_categories = config.fetch.max_concurrent_categories,
            "Fetcher initialized"
        );

        Ok(Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// Subscribe to fetch events
    ///
    /// Each subscriber receives every event. A subscriber that falls more than 256
    /// events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}
