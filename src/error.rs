//! Error types for crmscript-fetcher
//!
//! Two layers of errors exist:
//! - [`Error`] is returned by registry, configuration and lifecycle operations and
//!   propagates to the caller.
//! - [`CategoryError`] describes why a single category could not be fetched. It never
//!   propagates past a fetch; the orchestrator folds it into the
//!   [`FetchOutcome`](crate::types::FetchOutcome) text.

use thiserror::Error;

/// Result type alias for crmscript-fetcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for crmscript-fetcher
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_categories")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Tenant registry error (missing or duplicate id)
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Registry-level errors, surfaced directly to the caller of a CRUD operation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    /// No tenant with this id exists
    #[error("tenant {id} not found")]
    NotFound {
        /// The tenant ID that was not found
        id: i64,
    },

    /// A tenant with this id already exists
    #[error("tenant {id} already exists")]
    Duplicate {
        /// The conflicting tenant ID
        id: i64,
    },

    /// Another tenant already syncs into this local directory
    #[error("local directory {directory} is already used by tenant {other_id}")]
    DirectoryInUse {
        /// The contested directory
        directory: String,
        /// The tenant that already owns it
        other_id: i64,
    },
}

/// Why a single category could not be fetched
///
/// The `Display` text is the reason shown after `"<category>: "` in a fetch outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CategoryError {
    /// The remote endpoint could not be reached or answered with a server error
    #[error("network error: {0}")]
    Network(String),

    /// The remote endpoint rejected the access key
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The remote response was not in the expected shape
    #[error("unexpected remote response: {0}")]
    RemoteFormat(String),

    /// The category did not finish within its timeout
    #[error("timeout")]
    Timeout,

    /// Writing the category to the local directory failed
    #[error("write failed: {0}")]
    Io(String),

    /// The fetch was cancelled before the category finished
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Machine-readable error code for the presentation layer
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Tenant(TenantError::NotFound { .. }) => "not_found",
            Error::Tenant(TenantError::Duplicate { .. }) => "duplicate",
            Error::Tenant(TenantError::DirectoryInUse { .. }) => "directory_in_use",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether the error is a missing-tenant error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Tenant(TenantError::NotFound { .. }))
    }

    /// Whether the error is a duplicate-tenant error
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Tenant(TenantError::Duplicate { .. }))
    }
}

impl CategoryError {
    /// Machine-readable kind, used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            CategoryError::Network(_) => "network",
            CategoryError::Auth(_) => "auth",
            CategoryError::RemoteFormat(_) => "remote_format",
            CategoryError::Timeout => "timeout",
            CategoryError::Io(_) => "io",
            CategoryError::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for CategoryError {
    fn from(e: std::io::Error) -> Self {
        CategoryError::Io(e.to_string())
    }
}
