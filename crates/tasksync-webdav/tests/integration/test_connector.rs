//! Integration tests for WebDavConnector

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tasksync_core::connection::RemoteConnectionConfig;
use tasksync_core::ports::{IRemoteConnector, RemoteError};
use tasksync_webdav::WebDavConnector;

use crate::common;

fn connector() -> WebDavConnector {
    WebDavConnector::new(Duration::from_secs(5), "/tasks")
}

async fn mount_propfind(server: &MockServer, status: u16) {
    Mock::given(method("PROPFIND"))
        .and(path("/"))
        .and(header("Depth", "0"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_connect_creates_collection() {
    let server = MockServer::start().await;
    mount_propfind(&server, 207).await;
    Mock::given(method("MKCOL"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    common::mount_status(&server, "HEAD", "/tasks/tasks.json", 404).await;

    let store = connector()
        .connect(&common::connection(&server))
        .await
        .expect("connect");
    assert!(!store.exists("/tasks/tasks.json").await.unwrap());
}

#[tokio::test]
async fn test_connect_accepts_existing_collection() {
    let server = MockServer::start().await;
    mount_propfind(&server, 207).await;
    common::mount_status(&server, "MKCOL", "/tasks", 405).await;

    assert!(connector().connect(&common::connection(&server)).await.is_ok());
}

#[tokio::test]
async fn test_connect_with_wrong_credentials_is_rejected() {
    let server = MockServer::start().await;
    mount_propfind(&server, 401).await;

    let result = connector().connect(&common::connection(&server)).await;
    assert!(matches!(result, Err(RemoteError::Rejected(_))));
}

#[tokio::test]
async fn test_connect_with_invalid_settings_is_rejected() {
    let config = RemoteConnectionConfig::new("dav.example.com", "alice", "pw");
    let result = connector().connect(&config).await;
    assert!(matches!(result, Err(RemoteError::Rejected(_))));
}

#[tokio::test]
async fn test_connect_to_failing_server_is_unavailable() {
    let server = MockServer::start().await;
    mount_propfind(&server, 502).await;

    let result = connector().connect(&common::connection(&server)).await;
    assert!(matches!(result, Err(RemoteError::Unavailable(_))));
}
