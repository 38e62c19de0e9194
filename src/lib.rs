//! # crmscript-fetcher
//!
//! Library for mirroring the CRMScript configuration of remote CRM tenants into
//! local directories.
//!
//! A tenant registry (SQLite) records where each tenant lives and which categories
//! of artifacts to pull. A fetch asks the tenant's fetcher script for every enabled
//! category concurrently, renders the returned JSON into a file tree, and swaps
//! each category directory into place atomically.
//!
//! ## Quick Start
//!
//! ```no_run
//! use crmscript_fetcher::{Category, Config, CrmscriptFetcher, FetchOptions, NewTenant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = CrmscriptFetcher::new(Config::default()).await?;
//!
//!     let tenant = fetcher
//!         .add_tenant(NewTenant {
//!             include_id: "crmscript_fetcher".to_string(),
//!             key: "secret".to_string(),
//!             local_directory: "/srv/crm/prod".into(),
//!             tenant_name: "Production".to_string(),
//!             url: "https://online.example.com/Cust12345/CS".to_string(),
//!             fetch_options: FetchOptions::only(&[Category::Scripts, Category::Triggers]),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let mut events = fetcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let outcome = fetcher.fetch(&tenant).await;
//!     println!("success={} info={}", outcome.success, outcome.info);
//!
//!     fetcher.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Outcome aggregation across categories
pub mod aggregate;
/// Category rendering strategies
pub mod category;
/// Configuration types
pub mod config;
/// Tenant registry persistence
pub mod db;
/// Error types
pub mod error;
/// Fetcher facade (decomposed into focused submodules)
pub mod fetcher;
/// Per-tenant fetch orchestration
pub mod orchestrator;
/// Remote fetcher script client
pub mod remote;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Atomic category directory replacement
pub mod writer;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use category::{ArtifactSet, CategoryFetcher};
pub use config::{BusyPolicy, Config, FetchConfig, RetryConfig};
pub use db::Database;
pub use error::{CategoryError, DatabaseError, Error, Result, TenantError};
pub use fetcher::CrmscriptFetcher;
pub use remote::{HttpRemoteSource, RemotePayload, RemoteSource, TenantCredentials};
pub use types::{
    Category, Event, FetchOptions, FetchOutcome, NewTenant, TenantId, TenantRecord,
};
pub use writer::LocalWriter;
