//! Fetch orchestration
//!
//! A fetch goes through these steps:
//! 1. Validate the tenant record (no I/O)
//! 2. Select the enabled categories
//! 3. Take the tenant's fetch slot, then the slot of its local directory
//!    (reject or queue, see [`BusyPolicy`])
//! 4. Fetch categories concurrently, bounded by `max_concurrent_categories`,
//!    writing each success through the [`LocalWriter`]
//! 5. Fold the per-category reports into one [`FetchOutcome`]
//!
//! No step returns an error to the caller: every failure ends up in the outcome.

use crate::aggregate::{CategoryReport, aggregate};
use crate::category::{CategoryFetcher, FetchedCategory};
use crate::config::{BusyPolicy, FetchConfig, RetryConfig};
use crate::db::normalize_directory;
use crate::error::CategoryError;
use crate::remote::{RemoteSource, TenantCredentials};
use crate::retry::fetch_with_retry;
use crate::types::{Category, Event, FetchOutcome, TenantId, TenantRecord};
use crate::writer::LocalWriter;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Check a tenant record and derive its credentials
///
/// Returns the reasons joined by `", "` when the record cannot be fetched.
pub fn validate(record: &TenantRecord) -> Result<TenantCredentials, String> {
    let mut reasons = Vec::new();

    let url = record.url.trim();
    let base_url = if url.is_empty() {
        reasons.push("url required");
        None
    } else {
        match Url::parse(url) {
            Ok(parsed)
                if matches!(parsed.scheme(), "http" | "https")
                    && parsed.host_str().is_some_and(|h| !h.is_empty()) =>
            {
                Some(parsed)
            }
            _ => {
                reasons.push("url must be an absolute http(s) url");
                None
            }
        }
    };

    if record.key.trim().is_empty() {
        reasons.push("key required");
    }
    if record.local_directory.as_os_str().is_empty() {
        reasons.push("local directory required");
    }
    if record.include_id.trim().is_empty() {
        reasons.push("include id required");
    }

    match base_url {
        Some(base_url) if reasons.is_empty() => Ok(TenantCredentials {
            base_url,
            include_id: record.include_id.trim().to_string(),
            key: record.key.clone(),
        }),
        _ => Err(reasons.join(", ")),
    }
}

const SHUTTING_DOWN: &str = "shutting down, not accepting new fetches";

/// What a fetch slot serializes on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Tenant(TenantId),
    /// Resolved local directory, so two records pointing at the same tree share a slot
    Directory(PathBuf),
}

type SlotMap = Arc<std::sync::Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>>;
type ActiveMap = Arc<std::sync::Mutex<HashMap<TenantId, CancellationToken>>>;

fn lock<T>(mutex: &std::sync::Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A held fetch slot
///
/// Dropping it releases the slot and removes the map entry once nobody else
/// holds or waits for it.
struct SlotGuard {
    key: SlotKey,
    guard: Option<OwnedMutexGuard<()>>,
    slots: SlotMap,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = lock(&self.slots);
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}

/// Registration of a running fetch, removed when the fetch ends or is dropped
struct ActiveFetch {
    tenant_id: TenantId,
    token: CancellationToken,
    active: ActiveMap,
}

impl Drop for ActiveFetch {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.tenant_id);
    }
}

/// Resolve the directory a fetch writes to, following symlinks when it exists
async fn directory_key(local_directory: &Path) -> PathBuf {
    match tokio::fs::canonicalize(local_directory).await {
        Ok(resolved) => resolved,
        Err(_) => {
            let absolute = std::path::absolute(local_directory)
                .unwrap_or_else(|_| local_directory.to_path_buf());
            normalize_directory(&absolute)
        }
    }
}

/// Runs fetches for tenants
pub struct FetchOrchestrator {
    fetcher: CategoryFetcher,
    writer: LocalWriter,
    config: FetchConfig,
    retry: RetryConfig,
    event_tx: broadcast::Sender<Event>,
    /// Per-tenant and per-directory slots; holding one means a fetch is in flight
    slots: SlotMap,
    /// Cancellation tokens of running fetches
    active_fetches: ActiveMap,
    /// Cleared on shutdown, only while `active_fetches` is locked
    accepting_new: AtomicBool,
}

impl FetchOrchestrator {
    /// Create an orchestrator fetching through `remote`
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        config: FetchConfig,
        retry: RetryConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            fetcher: CategoryFetcher::new(remote),
            writer: LocalWriter,
            config,
            retry,
            event_tx,
            slots: Arc::new(std::sync::Mutex::new(HashMap::new())),
            active_fetches: Arc::new(std::sync::Mutex::new(HashMap::new())),
            accepting_new: AtomicBool::new(true),
        }
    }

    /// Fetch every enabled category of `record`
    pub async fn fetch(&self, record: &TenantRecord) -> FetchOutcome {
        let tenant_id = record.id;

        let credentials = match validate(record) {
            Ok(credentials) => credentials,
            Err(reason) => {
                tracing::info!(tenant_id = tenant_id.0, reason = %reason, "Tenant record invalid, not fetching");
                return FetchOutcome::invalid(reason);
            }
        };

        let categories = record.fetch_options.enabled();
        if categories.is_empty() {
            tracing::info!(tenant_id = tenant_id.0, "No categories selected");
            return FetchOutcome::nothing_selected();
        }

        if !self.accepting_new.load(Ordering::SeqCst) {
            return self.reject(tenant_id, SHUTTING_DOWN.to_string());
        }

        let Some(_tenant_slot) = self.acquire_slot(SlotKey::Tenant(tenant_id)).await else {
            return self.reject(
                tenant_id,
                format!("fetch already in progress for tenant {}", tenant_id),
            );
        };

        let directory = directory_key(&record.local_directory).await;
        let Some(_directory_slot) = self
            .acquire_slot(SlotKey::Directory(directory.clone()))
            .await
        else {
            return self.reject(
                tenant_id,
                format!(
                    "fetch already in progress for local directory {}",
                    directory.display()
                ),
            );
        };

        // A queued fetch may have waited through a shutdown
        let Some(active) = self.register(tenant_id) else {
            return self.reject(tenant_id, SHUTTING_DOWN.to_string());
        };

        tracing::info!(
            tenant_id = tenant_id.0,
            categories = categories.len(),
            "Fetch started"
        );
        let _ = self.event_tx.send(Event::FetchStarted {
            tenant_id,
            categories: categories.clone(),
        });

        let reports: Vec<CategoryReport> = stream::iter(categories)
            .map(|category| {
                self.run_category(
                    tenant_id,
                    &credentials,
                    &record.local_directory,
                    category,
                    &active.token,
                )
            })
            .buffer_unordered(self.config.max_concurrent_categories.max(1))
            .collect()
            .await;

        drop(active);

        let outcome = aggregate(reports);
        if outcome.success {
            tracing::info!(tenant_id = tenant_id.0, info = %outcome.info, "Fetch finished");
        } else {
            tracing::warn!(
                tenant_id = tenant_id.0,
                error = %outcome.error,
                info = %outcome.info,
                "Fetch finished with failures"
            );
        }
        let _ = self.event_tx.send(Event::FetchFinished {
            tenant_id,
            success: outcome.success,
        });

        outcome
    }

    /// Cancel the running fetch of a tenant
    ///
    /// Returns false if no fetch is running for the tenant.
    pub fn cancel(&self, tenant_id: TenantId) -> bool {
        match lock(&self.active_fetches).get(&tenant_id) {
            Some(token) => {
                tracing::info!(tenant_id = tenant_id.0, "Cancelling fetch");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Refuse new fetches and cancel the running ones
    pub fn cancel_all(&self) {
        let active = lock(&self.active_fetches);
        self.accepting_new.store(false, Ordering::SeqCst);

        tracing::debug!(active_count = active.len(), "Cancelling all active fetches");
        for (tenant_id, token) in active.iter() {
            tracing::debug!(tenant_id = tenant_id.0, "Signaling cancellation");
            token.cancel();
        }
    }

    /// Number of fetches currently running
    pub fn active_count(&self) -> usize {
        lock(&self.active_fetches).len()
    }

    /// Record a running fetch unless shutdown has begun
    ///
    /// The flag is checked under the same lock [`Self::cancel_all`] holds, so a
    /// registered fetch is always seen by it.
    fn register(&self, tenant_id: TenantId) -> Option<ActiveFetch> {
        let mut active = lock(&self.active_fetches);
        if !self.accepting_new.load(Ordering::SeqCst) {
            return None;
        }
        let token = CancellationToken::new();
        active.insert(tenant_id, token.clone());
        Some(ActiveFetch {
            tenant_id,
            token,
            active: Arc::clone(&self.active_fetches),
        })
    }

    /// Take a fetch slot according to the busy policy
    ///
    /// Returns `None` when the policy is [`BusyPolicy::Reject`] and the slot is taken.
    async fn acquire_slot(&self, key: SlotKey) -> Option<SlotGuard> {
        let slot = Arc::clone(
            lock(&self.slots)
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );

        let guard = match slot.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) if self.config.busy_policy == BusyPolicy::Reject => return None,
            Err(_) => {
                tracing::debug!(slot = ?key, "Waiting for running fetch to finish");
                slot.clone().lock_owned().await
            }
        };
        drop(slot);

        Some(SlotGuard {
            key,
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        })
    }

    fn reject(&self, tenant_id: TenantId, reason: String) -> FetchOutcome {
        tracing::info!(tenant_id = tenant_id.0, reason = %reason, "Fetch rejected");
        let _ = self.event_tx.send(Event::FetchRejected {
            tenant_id,
            reason: reason.clone(),
        });
        FetchOutcome::rejected(reason)
    }

    /// Fetch, render and write one category; never fails, the failure is in the report
    async fn run_category(
        &self,
        tenant_id: TenantId,
        credentials: &TenantCredentials,
        local_directory: &Path,
        category: Category,
        token: &CancellationToken,
    ) -> CategoryReport {
        let fetched: Result<FetchedCategory, CategoryError> = tokio::select! {
            biased;
            _ = token.cancelled() => Err(CategoryError::Cancelled),
            result = tokio::time::timeout(
                self.config.category_timeout,
                fetch_with_retry(&self.retry, || self.fetcher.fetch(credentials, category)),
            ) => result.unwrap_or(Err(CategoryError::Timeout)),
        };

        let report = match fetched {
            // Nothing is promoted once the fetch was cancelled
            Ok(_) if token.is_cancelled() => CategoryReport::failed(category, CategoryError::Cancelled),
            Ok(fetched) => {
                let script_version = fetched.script_version;
                match self
                    .writer
                    .write(local_directory, category, fetched.artifacts)
                    .await
                {
                    Ok(artifacts) => CategoryReport::succeeded(category, artifacts, script_version),
                    Err(e) => CategoryReport::failed(category, e),
                }
            }
            Err(e) => CategoryReport::failed(category, e),
        };

        match &report.result {
            Ok(artifacts) => {
                tracing::debug!(
                    tenant_id = tenant_id.0,
                    category = %category,
                    artifacts,
                    "Category fetched"
                );
                let _ = self.event_tx.send(Event::CategoryFetched {
                    tenant_id,
                    category,
                    artifacts: *artifacts,
                });
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id = tenant_id.0,
                    category = %category,
                    kind = e.kind(),
                    error = %e,
                    "Category failed"
                );
                let _ = self.event_tx.send(Event::CategoryFailed {
                    tenant_id,
                    category,
                    error: e.to_string(),
                });
            }
        }

        report
    }
}
