//! Running and cancelling fetches.

use crate::error::Result;
use crate::types::{FetchOutcome, TenantId, TenantRecord};

use super::CrmscriptFetcher;

impl CrmscriptFetcher {
    /// Fetch every enabled category of a tenant into its local directory
    ///
    /// Never fails: invalid records, busy tenants and per-category failures are
    /// all reported through the returned [`FetchOutcome`]. The record is used as
    /// given and does not need to be stored.
    pub async fn fetch(&self, tenant: &TenantRecord) -> FetchOutcome {
        self.orchestrator.fetch(tenant).await
    }

    /// Fetch a stored tenant by id
    ///
    /// # Errors
    /// [`TenantError::NotFound`](crate::error::TenantError::NotFound) if no
    /// tenant has `id`.
    pub async fn fetch_by_id(&self, id: TenantId) -> Result<FetchOutcome> {
        let tenant = self.get_tenant(id).await?;
        Ok(self.fetch(&tenant).await)
    }

    /// Cancel the running fetch of a tenant
    ///
    /// Categories still being retrieved end as cancelled. Categories already being
    /// written finish writing. Returns false if no fetch is running for `id`.
    pub fn cancel_fetch(&self, id: TenantId) -> bool {
        self.orchestrator.cancel(id)
    }
}
