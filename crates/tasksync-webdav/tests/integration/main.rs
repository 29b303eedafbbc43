//! Integration tests for tasksync-webdav
//!
//! Uses wiremock to simulate a WebDAV server and verifies the remote
//! store operations, status mapping, timeouts and the connect handshake.

mod common;

mod test_connector;
mod test_remote_store;
