//! Common test utilities for crmscript-fetcher integration tests

#![allow(dead_code)]

use crmscript_fetcher::{Config, CrmscriptFetcher, RetryConfig};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the fetcher script below a tenant's base URL
pub const SCRIPT_PATH: &str = "/Cust1/CS/scripts/customer.fcgi";

/// Create a fetcher whose registry lives in a fresh temp directory
///
/// Retries are kept short so transient-failure tests stay fast.
pub async fn create_test_fetcher() -> (CrmscriptFetcher, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config {
        database_path: temp_dir.path().join("tenants.db"),
        script_dir: temp_dir.path().to_path_buf(),
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    };

    let fetcher = CrmscriptFetcher::new(config).await.unwrap();
    (fetcher, temp_dir)
}

/// Base URL of a tenant served by `server`
pub fn tenant_url(server: &MockServer) -> String {
    format!("{}/Cust1/CS", server.uri())
}

/// Answer requests for `option_key` with `body`
pub async fn mount_category(server: &MockServer, option_key: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(SCRIPT_PATH))
        .and(query_param("action", "safeParse"))
        .and(query_param(option_key, "True"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answer requests for `option_key` with a bare status code
pub async fn mount_status(server: &MockServer, option_key: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(SCRIPT_PATH))
        .and(query_param(option_key, "True"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Version 2 document with a single script in a "Library" folder
pub fn scripts_document(body: &str) -> Value {
    json!({
        "script_version": 2,
        "group_scripts": {
            "script_folders": [{"id": 1, "parent_id": -1, "name": "Library"}],
            "scripts": [{"id": 10, "hierarchy_id": 1, "description": "Hello", "body": body}]
        }
    })
}

/// Version 2 document with two triggers
pub fn triggers_document() -> Value {
    json!({
        "script_version": 2,
        "group_triggers": {
            "triggers": [
                {"description": "Before save", "unique_identifier": "t1", "body": "a();"},
                {"description": "", "unique_identifier": "t2", "body": "b();"}
            ]
        }
    })
}

/// Relative paths of every file below `root`, sorted
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}
