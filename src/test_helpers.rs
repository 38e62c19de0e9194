//! Shared fixtures for unit tests

use crate::error::CategoryError;
use crate::remote::{RemotePayload, RemoteSource, TenantCredentials};
use crate::types::{Category, FetchOptions, TenantId, TenantRecord};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A small but complete version 2 group for `category`
///
/// Artifact counts when rendered: scripts 2, triggers 4, screens 9,
/// screen choosers 2, scheduled tasks 1, extra tables 8.
pub(crate) fn sample_group(category: Category) -> Value {
    match category {
        Category::Scripts => json!({
            "script_folders": [{"id": 1, "parent_id": -1, "name": "Library"}],
            "scripts": [{"id": 10, "hierarchy_id": 1, "description": "Hello", "body": "print(\"hi\");\n"}]
        }),
        Category::Triggers => json!({
            "triggers": [
                {"description": "Before save", "unique_identifier": "t1", "body": "a();"},
                {"description": "", "unique_identifier": "t2", "body": "b();"}
            ]
        }),
        Category::Screens => json!({
            "screen_folders": [],
            "screen_definition": [{
                "id": 7, "hierarchy_id": -1, "name": "Edit quote",
                "creation_script": "", "load_script_body": "", "load_post_cgi_script_body": "",
                "load_final_script_body": ""
            }],
            "screen_definition_action": [{"screen_definition": 7, "button": "Save", "ejscript_body": "save();"}],
            "screen_definition_element": [],
            "item_config": [],
            "screen_definition_hidden": [],
            "screen_definition_language": []
        }),
        Category::ScreenChoosers => json!({
            "screen_choosers": [{"description": "Ticket", "unique_identifier": "sc1", "body": "x"}]
        }),
        Category::ScheduledTasks => json!({
            "scheduled_task": [{"id": 1, "schedule_id": 2}],
            "schedule": [{"id": 2, "name": "Hourly", "next_execution": "soon"}]
        }),
        Category::ExtraTables => json!({
            "extra_table_folders": [],
            "extra_tables": [],
            "extra_fields": []
        }),
    }
}

/// A version 2 document holding only `category`'s group
pub(crate) fn sample_document(category: Category) -> Value {
    let mut document = json!({"script_version": 2});
    document[category.group_key()] = sample_group(category);
    document
}

/// Scripted [`RemoteSource`]
///
/// Categories without an explicit response answer with [`sample_document`].
#[derive(Default)]
pub(crate) struct FakeRemote {
    responses: Mutex<HashMap<Category, Result<Value, CategoryError>>>,
    delays: Mutex<HashMap<Category, Duration>>,
    default_delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, category: Category, response: Result<Value, CategoryError>) -> Self {
        self.responses.lock().unwrap().insert(category, response);
        self
    }

    pub(crate) fn delay(self, category: Category, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(category, delay);
        self
    }

    pub(crate) fn delay_all(self, delay: Duration) -> Self {
        *self.default_delay.lock().unwrap() = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn fetch_category(
        &self,
        _credentials: &TenantCredentials,
        category: Category,
    ) -> Result<RemotePayload, CategoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&category)
            .copied()
            .or(*self.default_delay.lock().unwrap());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = self
            .responses
            .lock()
            .unwrap()
            .get(&category)
            .cloned()
            .unwrap_or_else(|| Ok(sample_document(category)));
        RemotePayload::from_document(response?)
    }
}

/// A valid tenant record writing below `dir`
pub(crate) fn tenant(id: i64, dir: &Path, categories: &[Category]) -> TenantRecord {
    TenantRecord {
        id: TenantId(id),
        include_id: "crmscript_fetcher".to_string(),
        key: "secret".to_string(),
        local_directory: dir.to_path_buf(),
        tenant_name: format!("Tenant {id}"),
        url: "https://online.example.com/Cust1/CS".to_string(),
        fetch_options: FetchOptions::only(categories),
    }
}
