//! Shared helpers for WebDAV integration tests

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tasksync_core::connection::RemoteConnectionConfig;
use tasksync_webdav::{WebDavClient, WebDavRemoteStore};

pub const USERNAME: &str = "alice";
pub const CREDENTIAL: &str = "app-password";

/// `Last-Modified` value served by [`mount_file`]
pub const LAST_MODIFIED: &str = "Tue, 04 Mar 2025 10:15:30 GMT";

pub fn connection(server: &MockServer) -> RemoteConnectionConfig {
    RemoteConnectionConfig::new(server.uri(), USERNAME, CREDENTIAL)
}

/// Starts a mock server and returns a store pointed at it
pub async fn setup_store() -> (MockServer, WebDavRemoteStore) {
    let server = MockServer::start().await;
    let client = WebDavClient::new(&connection(&server), Duration::from_secs(5))
        .expect("client for mock server");
    (server, WebDavRemoteStore::new(client))
}

/// Serves `content` at `file_path` for HEAD and GET
pub async fn mount_file(server: &MockServer, file_path: &str, content: &[u8]) {
    Mock::given(method("HEAD"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).append_header("Last-Modified", LAST_MODIFIED))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Last-Modified", LAST_MODIFIED),
        )
        .mount(server)
        .await;
}

/// Answers every request for `file_path` with `status`
pub async fn mount_status(server: &MockServer, verb: &str, file_path: &str, status: u16) {
    Mock::given(method(verb))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
