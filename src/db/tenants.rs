//! Tenant registry CRUD operations.

use crate::error::{DatabaseError, TenantError};
use crate::types::{NewTenant, TenantId, TenantRecord};
use crate::{Error, Result};
use sqlx::Sqlite;
use std::path::{Component, Path, PathBuf};

use super::{Database, TenantRow};

const SELECT_TENANT_COLUMNS: &str = r#"
    SELECT id, include_id, access_key, local_directory, tenant_name, url,
           fetch_scripts, fetch_triggers, fetch_screens, fetch_screen_choosers,
           fetch_scheduled_tasks, fetch_extra_tables, created_at, updated_at
    FROM tenants
"#;

/// Strip trailing slashes so `https://host/Cust1/CS/` and `https://host/Cust1/CS` are stored alike
pub(crate) fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Lexically normalize a local directory (`/srv/crm/./prod/` is stored as `/srv/crm/prod`)
pub(crate) fn normalize_directory(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// The unique constraint a failed write ran into
#[derive(Debug, PartialEq, Eq)]
enum Conflict {
    Id,
    LocalDirectory,
}

fn conflict(e: &sqlx::Error) -> Option<Conflict> {
    let db = e.as_database_error()?;
    if !(db.is_unique_violation() || db.message().contains("UNIQUE constraint failed")) {
        return None;
    }
    if db.message().contains("local_directory") {
        Some(Conflict::LocalDirectory)
    } else {
        Some(Conflict::Id)
    }
}

/// Id of the tenant syncing into `directory`, other than `except`
async fn directory_owner<'e, E>(
    executor: E,
    directory: &str,
    except: Option<TenantId>,
) -> Option<TenantId>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, TenantId>(
        "SELECT id FROM tenants WHERE local_directory = ? AND id IS NOT ? LIMIT 1",
    )
    .bind(directory)
    .bind(except)
    .fetch_optional(executor)
    .await
    .ok()
    .flatten()
}

/// Turn a failed tenant write into the registry error the caller sees
async fn write_error<'e, E>(
    executor: E,
    e: sqlx::Error,
    id: Option<TenantId>,
    directory: &str,
    action: &str,
) -> Error
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    match (conflict(&e), id) {
        (Some(Conflict::Id), Some(id)) => Error::Tenant(TenantError::Duplicate { id: id.0 }),
        (Some(Conflict::LocalDirectory), _) => {
            match directory_owner(executor, directory, id).await {
                Some(owner) => Error::Tenant(TenantError::DirectoryInUse {
                    directory: directory.to_string(),
                    other_id: owner.0,
                }),
                None => Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to {}: {}",
                    action, e
                ))),
            }
        }
        _ => Error::Database(DatabaseError::QueryFailed(format!(
            "Failed to {}: {}",
            action, e
        ))),
    }
}

impl Database {
    /// List all tenants ordered by id
    pub async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!("{SELECT_TENANT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list tenants: {}",
                    e
                )))
            })?;

        Ok(rows.into_iter().map(TenantRecord::from).collect())
    }

    /// Get a tenant by ID
    pub async fn get_tenant(&self, id: TenantId) -> Result<Option<TenantRecord>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!("{SELECT_TENANT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get tenant: {}",
                    e
                )))
            })?;

        Ok(row.map(TenantRecord::from))
    }

    /// Number of stored tenants
    pub async fn count_tenants(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count tenants: {}",
                    e
                )))
            })?;

        Ok(count)
    }

    /// Insert a new tenant and return it with its assigned id
    ///
    /// When `tenant.id` is set the row is inserted under that id, failing with
    /// [`TenantError::Duplicate`] if it is taken. A local directory already used by
    /// another tenant fails with [`TenantError::DirectoryInUse`].
    pub async fn insert_tenant(&self, tenant: NewTenant) -> Result<TenantRecord> {
        let now = chrono::Utc::now().timestamp();
        let explicit_id = tenant.id;
        let url = normalize_url(&tenant.url);
        let local_directory = normalize_directory(&tenant.local_directory);
        let directory = local_directory.to_string_lossy().into_owned();
        let options = tenant.fetch_options;

        let result = sqlx::query(
            r#"
            INSERT INTO tenants (id, include_id, access_key, local_directory, tenant_name, url,
                                 fetch_scripts, fetch_triggers, fetch_screens,
                                 fetch_screen_choosers, fetch_scheduled_tasks, fetch_extra_tables,
                                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(explicit_id)
        .bind(&tenant.include_id)
        .bind(&tenant.key)
        .bind(&directory)
        .bind(&tenant.tenant_name)
        .bind(&url)
        .bind(options.scripts as i32)
        .bind(options.triggers as i32)
        .bind(options.screens as i32)
        .bind(options.screen_choosers as i32)
        .bind(options.scheduled_tasks as i32)
        .bind(options.extra_tables as i32)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                return Err(write_error(&self.pool, e, explicit_id, &directory, "insert tenant").await);
            }
        };

        let id = TenantId(result.last_insert_rowid());
        Ok(NewTenant {
            url,
            local_directory,
            ..tenant
        }
        .into_record(id))
    }

    /// Replace an existing tenant (full replacement, no partial patch)
    pub async fn update_tenant(&self, tenant: &TenantRecord) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let directory = normalize_directory(&tenant.local_directory)
            .to_string_lossy()
            .into_owned();
        let options = tenant.fetch_options;

        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET include_id = ?, access_key = ?, local_directory = ?, tenant_name = ?, url = ?,
                fetch_scripts = ?, fetch_triggers = ?, fetch_screens = ?,
                fetch_screen_choosers = ?, fetch_scheduled_tasks = ?, fetch_extra_tables = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&tenant.include_id)
        .bind(&tenant.key)
        .bind(&directory)
        .bind(&tenant.tenant_name)
        .bind(normalize_url(&tenant.url))
        .bind(options.scripts as i32)
        .bind(options.triggers as i32)
        .bind(options.screens as i32)
        .bind(options.screen_choosers as i32)
        .bind(options.scheduled_tasks as i32)
        .bind(options.extra_tables as i32)
        .bind(now)
        .bind(tenant.id)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                return Err(
                    write_error(&self.pool, e, Some(tenant.id), &directory, "update tenant").await,
                );
            }
        };

        if result.rows_affected() == 0 {
            return Err(Error::Tenant(TenantError::NotFound { id: tenant.id.0 }));
        }
        Ok(())
    }

    /// Delete a tenant
    ///
    /// Deleting an id that does not exist is an error, not a no-op.
    pub async fn delete_tenant(&self, id: TenantId) -> Result<()> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete tenant: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::Tenant(TenantError::NotFound { id: id.0 }));
        }
        Ok(())
    }

    /// Insert several tenants, keeping their ids, in a single transaction
    ///
    /// Used to import a legacy settings file. Either every record is imported or none:
    /// a duplicate id or a shared local directory aborts the whole import.
    pub async fn import_tenants(&self, tenants: &[TenantRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin import transaction: {}",
                e
            )))
        })?;
        let now = chrono::Utc::now().timestamp();

        for tenant in tenants {
            let options = tenant.fetch_options;
            let directory = normalize_directory(&tenant.local_directory)
                .to_string_lossy()
                .into_owned();
            let result = sqlx::query(
                r#"
                INSERT INTO tenants (id, include_id, access_key, local_directory, tenant_name, url,
                                     fetch_scripts, fetch_triggers, fetch_screens,
                                     fetch_screen_choosers, fetch_scheduled_tasks,
                                     fetch_extra_tables, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(tenant.id)
            .bind(&tenant.include_id)
            .bind(&tenant.key)
            .bind(&directory)
            .bind(&tenant.tenant_name)
            .bind(normalize_url(&tenant.url))
            .bind(options.scripts as i32)
            .bind(options.triggers as i32)
            .bind(options.screens as i32)
            .bind(options.screen_choosers as i32)
            .bind(options.scheduled_tasks as i32)
            .bind(options.extra_tables as i32)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await;

            // Dropping `tx` on the error path rolls the whole import back
            if let Err(e) = result {
                return Err(
                    write_error(&mut *tx, e, Some(tenant.id), &directory, "import tenant").await,
                );
            }
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit tenant import: {}",
                e
            )))
        })?;

        Ok(tenants.len())
    }
}
