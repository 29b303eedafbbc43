//! Integration tests for WebDavRemoteStore

use std::time::Duration;

use chrono::{TimeZone, Utc};
use wiremock::matchers::{basic_auth, body_bytes, method, path};
use wiremock::{Mock, ResponseTemplate};

use tasksync_core::ports::{IRemoteStore, RemoteError};

use crate::common;

// ============================================================================
// exists / modified_time
// ============================================================================

#[tokio::test]
async fn test_exists_true_for_present_file() {
    let (server, store) = common::setup_store().await;
    common::mount_file(&server, "/tasks/tasks.json", b"{}").await;

    assert!(store.exists("/tasks/tasks.json").await.unwrap());
}

#[tokio::test]
async fn test_exists_false_for_missing_file() {
    let (server, store) = common::setup_store().await;
    common::mount_status(&server, "HEAD", "/tasks/tasks.json", 404).await;

    assert!(!store.exists("/tasks/tasks.json").await.unwrap());
}

#[tokio::test]
async fn test_modified_time_parses_last_modified() {
    let (server, store) = common::setup_store().await;
    common::mount_file(&server, "/tasks/tasks.json", b"{}").await;

    let modified = store.modified_time("/tasks/tasks.json").await.unwrap();
    assert_eq!(modified, Utc.with_ymd_and_hms(2025, 3, 4, 10, 15, 30).unwrap());
}

#[tokio::test]
async fn test_modified_time_of_missing_file_is_not_found() {
    let (server, store) = common::setup_store().await;
    common::mount_status(&server, "HEAD", "/tasks/tasks.json", 404).await;

    assert_eq!(
        store.modified_time("/tasks/tasks.json").await,
        Err(RemoteError::NotFound("/tasks/tasks.json".into()))
    );
}

#[tokio::test]
async fn test_modified_time_without_header_is_rejected() {
    let (server, store) = common::setup_store().await;
    common::mount_status(&server, "HEAD", "/tasks/tasks.json", 200).await;

    assert!(matches!(
        store.modified_time("/tasks/tasks.json").await,
        Err(RemoteError::Rejected(_))
    ));
}

// ============================================================================
// upload / download
// ============================================================================

#[tokio::test]
async fn test_upload_puts_body_with_credentials() {
    let (server, store) = common::setup_store().await;
    Mock::given(method("PUT"))
        .and(path("/tasks/tasks_export.json"))
        .and(basic_auth(common::USERNAME, common::CREDENTIAL))
        .and(body_bytes(b"{\"tasks\":[]}".to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    store
        .upload("/tasks/tasks_export.json", b"{\"tasks\":[]}")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upload_twice_overwrites() {
    let (server, store) = common::setup_store().await;
    Mock::given(method("PUT"))
        .and(path("/tasks/tasks.json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    store.upload("/tasks/tasks.json", b"same").await.unwrap();
    store.upload("/tasks/tasks.json", b"same").await.unwrap();
}

#[tokio::test]
async fn test_download_returns_content() {
    let (server, store) = common::setup_store().await;
    let content = br#"{"format_version":1}"#;
    common::mount_file(&server, "/tasks/tasks.json", content).await;

    let data = store.download("/tasks/tasks.json").await.unwrap();
    assert_eq!(data, content);
}

#[tokio::test]
async fn test_download_missing_file_is_not_found() {
    let (server, store) = common::setup_store().await;
    common::mount_status(&server, "GET", "/tasks/tasks.json", 404).await;

    assert!(matches!(
        store.download("/tasks/tasks.json").await,
        Err(RemoteError::NotFound(_))
    ));
}

// ============================================================================
// Error mapping
// ============================================================================

#[tokio::test]
async fn test_auth_failure_is_rejected() {
    let (server, store) = common::setup_store().await;
    common::mount_status(&server, "PUT", "/tasks/tasks.json", 401).await;

    let err = store.upload("/tasks/tasks.json", b"x").await.unwrap_err();
    assert!(matches!(err, RemoteError::Rejected(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_quota_exceeded_is_rejected() {
    let (server, store) = common::setup_store().await;
    common::mount_status(&server, "PUT", "/tasks/tasks.json", 507).await;

    assert!(matches!(
        store.upload("/tasks/tasks.json", b"x").await,
        Err(RemoteError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let (server, store) = common::setup_store().await;
    common::mount_status(&server, "PUT", "/tasks/tasks.json", 503).await;

    assert!(matches!(
        store.upload("/tasks/tasks.json", b"x").await,
        Err(RemoteError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_slow_server_times_out_as_unavailable() {
    let server = wiremock::MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/tasks.json"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = tasksync_webdav::WebDavClient::new(
        &common::connection(&server),
        Duration::from_millis(200),
    )
    .unwrap();
    let store = tasksync_webdav::WebDavRemoteStore::new(client);

    assert!(matches!(
        store.download("/tasks/tasks.json").await,
        Err(RemoteError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_unreachable_host_is_unavailable() {
    let config = tasksync_core::connection::RemoteConnectionConfig::new(
        "http://127.0.0.1:9",
        "alice",
        "pw",
    );
    let client =
        tasksync_webdav::WebDavClient::new(&config, Duration::from_millis(500)).unwrap();
    let store = tasksync_webdav::WebDavRemoteStore::new(client);

    assert!(matches!(
        store.exists("/tasks/tasks.json").await,
        Err(RemoteError::Unavailable(_))
    ));
}
