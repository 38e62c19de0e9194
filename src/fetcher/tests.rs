use super::*;
use crate::error::{Error, TenantError};
use crate::test_helpers::{FakeRemote, tenant};
use crate::types::{Category, FetchOptions, NewTenant, TenantId};
use std::path::Path;
use tempfile::TempDir;

async fn create_test_fetcher() -> (CrmscriptFetcher, TempDir) {
    create_test_fetcher_with(|_| {}).await
}

async fn create_test_fetcher_with(
    customize: impl FnOnce(&mut Config),
) -> (CrmscriptFetcher, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config {
        database_path: temp_dir.path().join("fetcher.db"),
        script_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.retry.jitter = false;
    customize(&mut config);

    let fetcher = CrmscriptFetcher::with_remote(config, Arc::new(FakeRemote::new()))
        .await
        .unwrap();
    (fetcher, temp_dir)
}

fn new_tenant(name: &str, dir: &Path) -> NewTenant {
    NewTenant {
        id: None,
        include_id: "crmscript_fetcher".to_string(),
        key: "secret".to_string(),
        local_directory: dir.to_path_buf(),
        tenant_name: name.to_string(),
        url: "https://online.example.com/Cust1/CS/".to_string(),
        fetch_options: FetchOptions::only(&[Category::Scripts]),
    }
}

#[tokio::test]
async fn add_assigns_ids_and_list_returns_them() {
    let (fetcher, temp) = create_test_fetcher().await;

    let first = fetcher
        .add_tenant(new_tenant("Prod", &temp.path().join("prod")))
        .await
        .unwrap();
    let second = fetcher
        .add_tenant(new_tenant("Prod", &temp.path().join("prod-copy")))
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    // Trailing slash is not stored
    assert_eq!(first.url, "https://online.example.com/Cust1/CS");

    let listed = fetcher.list_tenants(false).await.unwrap();
    assert_eq!(listed, vec![first, second]);
}

#[tokio::test]
async fn add_with_existing_id_is_duplicate() {
    let (fetcher, temp) = create_test_fetcher().await;
    let mut tenant = new_tenant("A", &temp.path().join("a"));
    tenant.id = Some(TenantId(42));

    fetcher.add_tenant(tenant.clone()).await.unwrap();
    tenant.local_directory = temp.path().join("b");
    let err = fetcher.add_tenant(tenant).await.unwrap_err();

    assert!(err.is_duplicate(), "{err:?}");
    assert_eq!(err.error_code(), "duplicate");
    assert_eq!(fetcher.list_tenants(false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_replaces_the_record() {
    let (fetcher, temp) = create_test_fetcher().await;
    let mut record = fetcher
        .add_tenant(new_tenant("Before", temp.path()))
        .await
        .unwrap();

    record.tenant_name = "After".to_string();
    record.fetch_options = FetchOptions::all();
    fetcher.update_tenant(record.clone()).await.unwrap();

    assert_eq!(fetcher.get_tenant(record.id).await.unwrap(), record);
}

#[tokio::test]
async fn update_missing_tenant_is_not_found() {
    let (fetcher, temp) = create_test_fetcher().await;
    let record = tenant(99, temp.path(), &[]);

    let err = fetcher.update_tenant(record).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Tenant(TenantError::NotFound { id: 99 })
    ));
}

#[tokio::test]
async fn delete_missing_tenant_is_not_found() {
    let (fetcher, _temp) = create_test_fetcher().await;

    let err = fetcher.delete_tenant(TenantId(7)).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "tenant 7 not found");
}

#[tokio::test]
async fn delete_removes_tenant_and_is_not_repeatable() {
    let (fetcher, temp) = create_test_fetcher().await;
    let record = fetcher
        .add_tenant(new_tenant("Gone", temp.path()))
        .await
        .unwrap();

    fetcher.delete_tenant(record.id).await.unwrap();

    assert!(fetcher.list_tenants(false).await.unwrap().is_empty());
    assert!(fetcher.delete_tenant(record.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn ids_are_not_reused_after_delete() {
    let (fetcher, temp) = create_test_fetcher().await;
    let first = fetcher
        .add_tenant(new_tenant("One", temp.path()))
        .await
        .unwrap();
    fetcher.delete_tenant(first.id).await.unwrap();

    let second = fetcher
        .add_tenant(new_tenant("Two", temp.path()))
        .await
        .unwrap();
    assert!(second.id > first.id);
}

#[tokio::test]
async fn initial_load_imports_legacy_settings_once() {
    let legacy_dir = tempfile::tempdir().unwrap();
    let legacy_path = legacy_dir.path().join("tenant_settings.json");
    std::fs::write(
        &legacy_path,
        r#"[
            {
                "id": 1,
                "tenant_name": "Old tenant",
                "url": "https://online.example.com/Cust2/CS/",
                "include_id": "crmscript_fetcher",
                "key": "k1",
                "local_directory": "/tmp/old"
            },
            {
                "id": 5,
                "tenant_name": "Newer tenant",
                "url": "https://online.example.com/Cust3/CS",
                "include_id": "crmscript_fetcher",
                "key": "k5",
                "local_directory": "/tmp/newer",
                "fetch_options": {"fetch_scripts": true, "fetch_triggers": false}
            }
        ]"#,
    )
    .unwrap();

    let path = legacy_path.clone();
    let (fetcher, _temp) =
        create_test_fetcher_with(move |config| config.legacy_settings_path = Some(path)).await;

    // A plain list does no housekeeping
    assert!(fetcher.list_tenants(false).await.unwrap().is_empty());

    let tenants = fetcher.list_tenants(true).await.unwrap();
    assert_eq!(tenants.len(), 2);
    assert_eq!(tenants[0].id, TenantId(1));
    assert_eq!(tenants[0].url, "https://online.example.com/Cust2/CS");
    assert_eq!(tenants[0].fetch_options, FetchOptions::all());
    assert_eq!(tenants[1].id, TenantId(5));
    assert_eq!(
        tenants[1].fetch_options,
        FetchOptions::only(&[Category::Scripts])
    );

    // The registry is no longer empty, so a second initial load imports nothing
    fetcher.delete_tenant(TenantId(1)).await.unwrap();
    assert_eq!(fetcher.list_tenants(true).await.unwrap().len(), 1);

    // New ids continue after the imported ones
    let added = fetcher
        .add_tenant(new_tenant("Fresh", Path::new("/tmp/fresh")))
        .await
        .unwrap();
    assert_eq!(added.id, TenantId(6));
}

#[tokio::test]
async fn initial_load_with_duplicate_legacy_ids_imports_nothing() {
    let legacy_dir = tempfile::tempdir().unwrap();
    let legacy_path = legacy_dir.path().join("tenant_settings.json");
    std::fs::write(
        &legacy_path,
        r#"[
            {
                "id": 2,
                "tenant_name": "First",
                "url": "https://online.example.com/Cust2/CS",
                "include_id": "crmscript_fetcher",
                "key": "k1",
                "local_directory": "/tmp/first"
            },
            {
                "id": 2,
                "tenant_name": "Copy",
                "url": "https://online.example.com/Cust3/CS",
                "include_id": "crmscript_fetcher",
                "key": "k2",
                "local_directory": "/tmp/copy"
            }
        ]"#,
    )
    .unwrap();

    let path = legacy_path.clone();
    let (fetcher, _temp) =
        create_test_fetcher_with(move |config| config.legacy_settings_path = Some(path)).await;

    let err = fetcher.list_tenants(true).await.unwrap_err();
    assert!(
        matches!(err, Error::Tenant(TenantError::Duplicate { id: 2 })),
        "expected duplicate, got {err:?}"
    );
    assert!(fetcher.list_tenants(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn initial_load_without_legacy_file_is_plain_list() {
    let (fetcher, temp) = create_test_fetcher_with(|config| {
        config.legacy_settings_path = Some("/nonexistent/tenant_settings.json".into())
    })
    .await;

    assert!(fetcher.list_tenants(true).await.unwrap().is_empty());
    drop(temp);
}

#[tokio::test]
async fn fetcher_script_reads_template() {
    let (fetcher, temp) = create_test_fetcher().await;
    std::fs::write(
        temp.path().join("CRMScript Fetcher.crmscript"),
        "#setLanguageLevel 4;",
    )
    .unwrap();

    assert_eq!(fetcher.fetcher_script().await.unwrap(), "#setLanguageLevel 4;");

    // The preferred name wins when both exist
    std::fs::write(temp.path().join("crmscript_fetcher.crmscript"), "preferred").unwrap();
    assert_eq!(fetcher.fetcher_script().await.unwrap(), "preferred");
}

#[tokio::test]
async fn fetcher_script_missing_is_io_error() {
    let (fetcher, _temp) = create_test_fetcher().await;

    let err = fetcher.fetcher_script().await.unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected I/O error, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_by_id_writes_local_directory() {
    let (fetcher, temp) = create_test_fetcher().await;
    let local = temp.path().join("tenant");
    let record = fetcher
        .add_tenant(new_tenant("Prod", &local))
        .await
        .unwrap();

    let outcome = fetcher.fetch_by_id(record.id).await.unwrap();

    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.info, "scripts: 2 artifacts");
    assert!(local.join("Scripts/Library/Hello.crmscript").is_file());

    assert!(fetcher.fetch_by_id(TenantId(1234)).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn fetch_never_errors_on_invalid_records() {
    let (fetcher, temp) = create_test_fetcher().await;
    let mut record = tenant(1, temp.path(), &[Category::Scripts]);
    record.key = String::new();
    record.local_directory = Default::default();

    let outcome = fetcher.fetch(&record).await;

    assert!(outcome.validation_error);
    assert_eq!(outcome.error, "key required, local directory required");
}

#[tokio::test]
async fn cancel_fetch_without_running_fetch_returns_false() {
    let (fetcher, _temp) = create_test_fetcher().await;
    assert!(!fetcher.cancel_fetch(TenantId(1)));
}

#[tokio::test]
async fn shutdown_emits_event_and_refuses_new_fetches() {
    let (fetcher, temp) = create_test_fetcher().await;
    let mut events = fetcher.subscribe();

    fetcher.shutdown().await.unwrap();

    let mut saw_shutdown = false;
    while let Ok(event) = events.try_recv() {
        saw_shutdown |= matches!(event, Event::Shutdown);
    }
    assert!(saw_shutdown);

    let outcome = fetcher
        .fetch(&tenant(1, temp.path(), &[Category::Scripts]))
        .await;
    assert!(!outcome.success);
    assert!(!outcome.validation_error);
    assert!(!temp.path().join("Scripts").exists());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = Config {
        database_path: temp.path().join("fetcher.db"),
        ..Config::default()
    };
    config.fetch.max_concurrent_categories = 0;

    let result = CrmscriptFetcher::with_remote(config, Arc::new(FakeRemote::new())).await;
    assert!(matches!(result, Err(Error::Config { .. })));
}
