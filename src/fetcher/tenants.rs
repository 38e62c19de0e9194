//! Tenant registry operations.

use crate::error::{Error, Result, TenantError};
use crate::types::{FetchOptions, NewTenant, TenantId, TenantRecord};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::CrmscriptFetcher;

/// Entry of a legacy `tenant_settings.json` file
///
/// Files written before fetch options existed have no `fetch_options` member;
/// those tenants fetched everything.
#[derive(Debug, Deserialize)]
struct LegacyTenant {
    id: i64,
    #[serde(default)]
    include_id: String,
    #[serde(default)]
    key: String,
    #[serde(default)]
    local_directory: PathBuf,
    #[serde(default)]
    tenant_name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    fetch_options: Option<FetchOptions>,
}

impl From<LegacyTenant> for TenantRecord {
    fn from(legacy: LegacyTenant) -> Self {
        TenantRecord {
            id: TenantId(legacy.id),
            include_id: legacy.include_id,
            key: legacy.key,
            local_directory: legacy.local_directory,
            tenant_name: legacy.tenant_name,
            url: legacy.url,
            fetch_options: legacy.fetch_options.unwrap_or_else(FetchOptions::all),
        }
    }
}

impl CrmscriptFetcher {
    /// List all tenants ordered by id
    ///
    /// With `initial_load`, an empty registry is first seeded from the configured
    /// legacy settings file, if there is one.
    pub async fn list_tenants(&self, initial_load: bool) -> Result<Vec<TenantRecord>> {
        if initial_load {
            self.import_legacy_settings().await?;
        }
        self.db.list_tenants().await
    }

    /// Get a single tenant
    pub async fn get_tenant(&self, id: TenantId) -> Result<TenantRecord> {
        self.db
            .get_tenant(id)
            .await?
            .ok_or(Error::Tenant(TenantError::NotFound { id: id.0 }))
    }

    /// Register a tenant; the registry assigns its id
    ///
    /// # Errors
    /// [`TenantError::Duplicate`] if `tenant.id` is set and already taken.
    pub async fn add_tenant(&self, tenant: NewTenant) -> Result<TenantRecord> {
        let record = self.db.insert_tenant(tenant).await?;
        tracing::info!(tenant_id = record.id.0, name = %record.tenant_name, "Tenant added");
        Ok(record)
    }

    /// Replace a tenant's stored record
    ///
    /// # Errors
    /// [`TenantError::NotFound`] if no tenant has `tenant.id`.
    pub async fn update_tenant(&self, tenant: TenantRecord) -> Result<()> {
        self.db.update_tenant(&tenant).await?;
        tracing::info!(tenant_id = tenant.id.0, "Tenant updated");
        Ok(())
    }

    /// Remove a tenant
    ///
    /// A running fetch for the tenant is not interrupted.
    ///
    /// # Errors
    /// [`TenantError::NotFound`] if no tenant has `id`.
    pub async fn delete_tenant(&self, id: TenantId) -> Result<()> {
        self.db.delete_tenant(id).await?;
        tracing::info!(tenant_id = id.0, "Tenant deleted");
        Ok(())
    }

    /// Import the legacy settings file into an empty registry
    ///
    /// Returns the number of imported tenants.
    async fn import_legacy_settings(&self) -> Result<usize> {
        let Some(path) = self.config.legacy_settings_path.as_deref() else {
            return Ok(0);
        };
        if self.db.count_tenants().await? > 0 || !tokio::fs::try_exists(path).await? {
            return Ok(0);
        }

        let records = read_legacy_settings(path).await?;
        let imported = self.db.import_tenants(&records).await?;
        tracing::info!(
            path = %path.display(),
            imported,
            "Imported tenants from legacy settings file"
        );
        Ok(imported)
    }
}

async fn read_legacy_settings(path: &Path) -> Result<Vec<TenantRecord>> {
    let content = tokio::fs::read_to_string(path).await?;
    let legacy: Vec<LegacyTenant> = serde_json::from_str(&content)?;
    Ok(legacy.into_iter().map(TenantRecord::from).collect())
}
