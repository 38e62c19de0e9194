//! Core types for crmscript-fetcher

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a tenant
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl TenantId {
    /// Create a new TenantId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TenantId> for i64 {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for TenantId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TenantId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TenantId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Category of configuration artifacts that can be fetched from a tenant
///
/// The set is closed: every category has exactly one rendering strategy in
/// [`crate::category`]. The declaration order is the order used when reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// CRMScript scripts, organized in folders
    Scripts,
    /// Event triggers
    Triggers,
    /// Screen definitions with load scripts and buttons
    Screens,
    /// Screen chooser scripts
    ScreenChoosers,
    /// Scheduled tasks with their schedules
    ScheduledTasks,
    /// Extra tables and extra fields
    ExtraTables,
}

impl Category {
    /// Every category, in reporting order
    pub const ALL: [Category; 6] = [
        Category::Scripts,
        Category::Triggers,
        Category::Screens,
        Category::ScreenChoosers,
        Category::ScheduledTasks,
        Category::ExtraTables,
    ];

    /// Short name used in outcome messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Scripts => "scripts",
            Category::Triggers => "triggers",
            Category::Screens => "screens",
            Category::ScreenChoosers => "screen_choosers",
            Category::ScheduledTasks => "scheduled_tasks",
            Category::ExtraTables => "extra_tables",
        }
    }

    /// Name of the category's subdirectory inside a tenant's local directory
    pub fn directory_name(&self) -> &'static str {
        match self {
            Category::Scripts => "Scripts",
            Category::Triggers => "Triggers",
            Category::Screens => "Screens",
            Category::ScreenChoosers => "ScreenChoosers",
            Category::ScheduledTasks => "Scheduled tasks",
            Category::ExtraTables => "Tables",
        }
    }

    /// Query parameter the remote fetcher script reads to enable this category
    pub fn option_key(&self) -> &'static str {
        match self {
            Category::Scripts => "fetch_scripts",
            Category::Triggers => "fetch_triggers",
            Category::Screens => "fetch_screens",
            Category::ScreenChoosers => "fetch_screen_choosers",
            Category::ScheduledTasks => "fetch_scheduled_tasks",
            Category::ExtraTables => "fetch_extra_tables",
        }
    }

    /// Key of the category's group in the remote JSON payload
    pub fn group_key(&self) -> &'static str {
        match self {
            Category::Scripts => "group_scripts",
            Category::Triggers => "group_triggers",
            Category::Screens => "group_screens",
            Category::ScreenChoosers => "group_screen_choosers",
            Category::ScheduledTasks => "group_scheduled_tasks",
            Category::ExtraTables => "group_extra_tables",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category toggles deciding which categories take part in a fetch
///
/// Field names match the persisted settings format (`fetch_scripts`, ...).
/// A missing field deserializes as `false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Fetch scripts
    #[serde(rename = "fetch_scripts")]
    pub scripts: bool,
    /// Fetch triggers
    #[serde(rename = "fetch_triggers")]
    pub triggers: bool,
    /// Fetch screens
    #[serde(rename = "fetch_screens")]
    pub screens: bool,
    /// Fetch screen choosers
    #[serde(rename = "fetch_screen_choosers")]
    pub screen_choosers: bool,
    /// Fetch scheduled tasks
    #[serde(rename = "fetch_scheduled_tasks")]
    pub scheduled_tasks: bool,
    /// Fetch extra tables
    #[serde(rename = "fetch_extra_tables")]
    pub extra_tables: bool,
}

impl FetchOptions {
    /// Options with every category enabled
    ///
    /// This is what tenants saved before fetch options existed are upgraded to.
    pub fn all() -> Self {
        Self {
            scripts: true,
            triggers: true,
            screens: true,
            screen_choosers: true,
            scheduled_tasks: true,
            extra_tables: true,
        }
    }

    /// Options with only the given categories enabled
    pub fn only(categories: &[Category]) -> Self {
        let mut options = Self::default();
        for category in categories {
            options.set(*category, true);
        }
        options
    }

    /// Whether a category is enabled
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Scripts => self.scripts,
            Category::Triggers => self.triggers,
            Category::Screens => self.screens,
            Category::ScreenChoosers => self.screen_choosers,
            Category::ScheduledTasks => self.scheduled_tasks,
            Category::ExtraTables => self.extra_tables,
        }
    }

    /// Enable or disable a category
    pub fn set(&mut self, category: Category, enabled: bool) {
        let flag = match category {
            Category::Scripts => &mut self.scripts,
            Category::Triggers => &mut self.triggers,
            Category::Screens => &mut self.screens,
            Category::ScreenChoosers => &mut self.screen_choosers,
            Category::ScheduledTasks => &mut self.scheduled_tasks,
            Category::ExtraTables => &mut self.extra_tables,
        };
        *flag = enabled;
    }

    /// Enabled categories, in reporting order
    pub fn enabled(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }
}

/// A registered tenant: a remote content source plus its local sync target
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    /// Store-assigned identifier, immutable once created
    pub id: TenantId,
    /// Include ID of the fetcher script on the remote side
    pub include_id: String,
    /// Access key passed to the fetcher script
    pub key: String,
    /// Directory the fetched categories are written into
    pub local_directory: PathBuf,
    /// Display label (not unique)
    pub tenant_name: String,
    /// Base URL of the remote installation
    pub url: String,
    /// Which categories take part in a fetch
    #[serde(default)]
    pub fetch_options: FetchOptions,
}

/// A tenant that has not been stored yet
///
/// `id` is normally left empty so the store assigns one. Supplying an id that
/// already exists makes the insert fail with a duplicate error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTenant {
    /// Explicit id (normally `None`)
    #[serde(default)]
    pub id: Option<TenantId>,
    /// Include ID of the fetcher script on the remote side
    #[serde(default)]
    pub include_id: String,
    /// Access key passed to the fetcher script
    #[serde(default)]
    pub key: String,
    /// Directory the fetched categories are written into
    #[serde(default)]
    pub local_directory: PathBuf,
    /// Display label
    #[serde(default)]
    pub tenant_name: String,
    /// Base URL of the remote installation
    #[serde(default)]
    pub url: String,
    /// Which categories take part in a fetch
    #[serde(default)]
    pub fetch_options: FetchOptions,
}

impl NewTenant {
    /// Attach a store-assigned id
    pub fn into_record(self, id: TenantId) -> TenantRecord {
        TenantRecord {
            id,
            include_id: self.include_id,
            key: self.key,
            local_directory: self.local_directory,
            tenant_name: self.tenant_name,
            url: self.url,
            fetch_options: self.fetch_options,
        }
    }
}

/// Consolidated result of one fetch call
///
/// `success` is all-or-nothing: it is true only if every enabled category was
/// fetched and written. Per-category detail lives in `error` and `info`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// Every enabled category succeeded
    pub success: bool,
    /// The tenant record itself was invalid; nothing was attempted
    pub validation_error: bool,
    /// Summary of failing categories (empty when none failed)
    pub error: String,
    /// Summary of succeeding categories, or a notice
    pub info: String,
}

impl FetchOutcome {
    /// Outcome for a tenant record that failed validation
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            validation_error: true,
            error: reason.into(),
            info: String::new(),
        }
    }

    /// Outcome for a tenant with no category enabled
    pub fn nothing_selected() -> Self {
        Self {
            success: true,
            validation_error: false,
            error: String::new(),
            info: "no categories selected".to_string(),
        }
    }

    /// Outcome for a fetch that was refused before any category was attempted
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            validation_error: false,
            error: reason.into(),
            info: String::new(),
        }
    }
}

/// Event emitted during the fetch lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A fetch passed validation and began dispatching categories
    FetchStarted {
        /// Tenant ID
        tenant_id: TenantId,
        /// Categories that will be fetched
        categories: Vec<Category>,
    },

    /// A category was fetched and written to disk
    CategoryFetched {
        /// Tenant ID
        tenant_id: TenantId,
        /// Category
        category: Category,
        /// Number of artifacts written
        artifacts: usize,
    },

    /// A category failed
    CategoryFailed {
        /// Tenant ID
        tenant_id: TenantId,
        /// Category
        category: Category,
        /// Failure reason
        error: String,
    },

    /// A fetch finished (all categories settled)
    FetchFinished {
        /// Tenant ID
        tenant_id: TenantId,
        /// Whether every category succeeded
        success: bool,
    },

    /// A fetch was refused because another fetch for the tenant is running
    FetchRejected {
        /// Tenant ID
        tenant_id: TenantId,
        /// Why the fetch was refused
        reason: String,
    },

    /// The fetcher is shutting down
    Shutdown,
}
