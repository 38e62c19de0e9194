//! Database layer for crmscript-fetcher
//!
//! Handles SQLite persistence of the tenant registry.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`tenants`] - Tenant registry CRUD

use crate::types::{FetchOptions, TenantId, TenantRecord};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod migrations;
mod tenants;

pub(crate) use tenants::normalize_directory;

/// Tenant record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct TenantRow {
    /// Unique database ID
    pub id: i64,
    /// Include ID of the fetcher script
    pub include_id: String,
    /// Access key
    pub access_key: String,
    /// Local sync directory
    pub local_directory: String,
    /// Display label
    pub tenant_name: String,
    /// Base URL of the remote installation
    pub url: String,
    /// Fetch scripts (0 = no, 1 = yes)
    pub fetch_scripts: i32,
    /// Fetch triggers (0 = no, 1 = yes)
    pub fetch_triggers: i32,
    /// Fetch screens (0 = no, 1 = yes)
    pub fetch_screens: i32,
    /// Fetch screen choosers (0 = no, 1 = yes)
    pub fetch_screen_choosers: i32,
    /// Fetch scheduled tasks (0 = no, 1 = yes)
    pub fetch_scheduled_tasks: i32,
    /// Fetch extra tables (0 = no, 1 = yes)
    pub fetch_extra_tables: i32,
    /// Unix timestamp when the tenant was added
    pub created_at: i64,
    /// Unix timestamp of the last update
    pub updated_at: i64,
}

impl From<TenantRow> for TenantRecord {
    fn from(row: TenantRow) -> Self {
        TenantRecord {
            id: TenantId(row.id),
            include_id: row.include_id,
            key: row.access_key,
            local_directory: PathBuf::from(row.local_directory),
            tenant_name: row.tenant_name,
            url: row.url,
            fetch_options: FetchOptions {
                scripts: row.fetch_scripts != 0,
                triggers: row.fetch_triggers != 0,
                screens: row.fetch_screens != 0,
                screen_choosers: row.fetch_screen_choosers != 0,
                scheduled_tasks: row.fetch_scheduled_tasks != 0,
                extra_tables: row.fetch_extra_tables != 0,
            },
        }
    }
}

/// Database handle for crmscript-fetcher
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
