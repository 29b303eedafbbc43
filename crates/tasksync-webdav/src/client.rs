//! WebDAV HTTP client
//!
//! Thin typed wrapper around `reqwest::Client` for the handful of WebDAV
//! verbs the sync engine needs: `HEAD`, `GET`, `PUT`, `MKCOL` and
//! `PROPFIND`. Every request carries HTTP Basic credentials and is bounded
//! by the configured timeout. Nothing is retried here.
//!
//! ## Status mapping
//!
//! | Response                         | Error                       |
//! |----------------------------------|-----------------------------|
//! | connect failure, timeout         | `RemoteError::Unavailable`  |
//! | 408, 429, 5xx except 507         | `RemoteError::Unavailable`  |
//! | 404                              | `RemoteError::NotFound`     |
//! | 401, 403, 409, 413, 507, other   | `RemoteError::Rejected`     |

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, trace};

use tasksync_core::connection::RemoteConnectionConfig;
use tasksync_core::ports::RemoteError;

/// HTTP client bound to one WebDAV endpoint and account
pub struct WebDavClient {
    client: Client,
    /// Base URL without a trailing slash
    base_url: String,
    username: String,
    credential: String,
}

impl WebDavClient {
    /// Build a client for `config`, bounding every request by `timeout`
    pub fn new(config: &RemoteConnectionConfig, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = config
            .base_url()
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            username: config.username.clone(),
            credential: config.credential.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a remote path such as `/tasks/tasks.json`
    pub fn url_for(&self, path: &str) -> String {
        if path.is_empty() || path == "/" {
            format!("{}/", self.base_url)
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Authenticated request builder for `method` on `path`
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url_for(path))
            .basic_auth(&self.username, Some(&self.credential))
    }

    // ========================================================================
    // Verbs
    // ========================================================================

    /// `HEAD`; `Ok(None)` when the path does not exist
    pub async fn head(&self, path: &str) -> Result<Option<Response>, RemoteError> {
        let response = self.send(self.request(Method::HEAD, path), "HEAD", path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(response, "HEAD", path)?))
    }

    /// `GET` and return the full body
    pub async fn get(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self.send(self.request(Method::GET, path), "GET", path).await?;
        let response = check_status(response, "GET", path)?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        debug!(path, bytes = bytes.len(), "Downloaded remote file");
        Ok(bytes.to_vec())
    }

    /// `PUT` the given bytes, creating or overwriting the file
    pub async fn put(&self, path: &str, data: &[u8]) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::PUT, path)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(data.to_vec());
        let response = self.send(builder, "PUT", path).await?;
        check_status(response, "PUT", path)?;
        debug!(path, bytes = data.len(), "Uploaded remote file");
        Ok(())
    }

    /// `MKCOL`; returns false when the collection already existed
    pub async fn mkcol(&self, path: &str) -> Result<bool, RemoteError> {
        let response = self.send(self.request(webdav_method(b"MKCOL")?, path), "MKCOL", path).await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            trace!(path, "Collection already exists");
            return Ok(false);
        }
        check_status(response, "MKCOL", path)?;
        debug!(path, "Created remote collection");
        Ok(true)
    }

    /// `PROPFIND` with `Depth: 0`, used to verify host and credentials
    pub async fn propfind(&self, path: &str) -> Result<(), RemoteError> {
        let builder = self
            .request(webdav_method(b"PROPFIND")?, path)
            .header("Depth", "0");
        let response = self.send(builder, "PROPFIND", path).await?;
        check_status(response, "PROPFIND", path)?;
        Ok(())
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        verb: &str,
        path: &str,
    ) -> Result<Response, RemoteError> {
        trace!(verb, path, "Sending WebDAV request");
        builder.send().await.map_err(transport_error)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn webdav_method(name: &[u8]) -> Result<Method, RemoteError> {
    Method::from_bytes(name).map_err(|e| RemoteError::Rejected(format!("invalid method: {e}")))
}

/// Map a transport-level failure (no HTTP status) to an error
fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Unavailable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        RemoteError::Unavailable(format!("connection failed: {e}"))
    } else {
        RemoteError::Unavailable(e.to_string())
    }
}

/// Map an HTTP status to an error, passing successful responses through
pub fn classify_status(status: StatusCode, verb: &str, path: &str) -> Result<(), RemoteError> {
    if status.is_success() {
        return Ok(());
    }
    let detail = format!("{verb} {path} returned {status}");
    Err(match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(path.to_string()),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::Unavailable(detail)
        }
        StatusCode::INSUFFICIENT_STORAGE => RemoteError::Rejected(detail),
        s if s.is_server_error() => RemoteError::Unavailable(detail),
        _ => RemoteError::Rejected(detail),
    })
}

fn check_status(response: Response, verb: &str, path: &str) -> Result<Response, RemoteError> {
    classify_status(response.status(), verb, path)?;
    Ok(response)
}

/// Parse the `Last-Modified` header of a response
pub fn last_modified(response: &Response, path: &str) -> Result<DateTime<Utc>, RemoteError> {
    let value = response
        .headers()
        .get(LAST_MODIFIED)
        .ok_or_else(|| RemoteError::Rejected(format!("no Last-Modified header for {path}")))?;
    let text = value
        .to_str()
        .map_err(|e| RemoteError::Rejected(format!("unreadable Last-Modified for {path}: {e}")))?;
    parse_http_date(text)
        .ok_or_else(|| RemoteError::Rejected(format!("invalid Last-Modified '{text}' for {path}")))
}

/// Parse an HTTP-date (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn parse_http_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_http_dates() {
        let parsed = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap());
        assert!(parse_http_date("yesterday").is_none());
    }

    #[test]
    fn classifies_statuses() {
        assert!(classify_status(StatusCode::CREATED, "PUT", "/a").is_ok());
        assert!(classify_status(StatusCode::NO_CONTENT, "PUT", "/a").is_ok());
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "GET", "/a"),
            Err(RemoteError::NotFound("/a".into()))
        );
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::CONFLICT,
            StatusCode::PAYLOAD_TOO_LARGE,
            StatusCode::INSUFFICIENT_STORAGE,
        ] {
            assert!(matches!(
                classify_status(status, "PUT", "/a"),
                Err(RemoteError::Rejected(_))
            ));
        }
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::TOO_MANY_REQUESTS,
        ] {
            assert!(matches!(
                classify_status(status, "GET", "/a"),
                Err(RemoteError::Unavailable(_))
            ));
        }
    }

    #[test]
    fn url_for_joins_base_and_path() {
        let config = RemoteConnectionConfig::new("https://dav.example.com/files/me/", "me", "pw");
        let client = WebDavClient::new(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://dav.example.com/files/me");
        assert_eq!(
            client.url_for("/tasks/tasks.json"),
            "https://dav.example.com/files/me/tasks/tasks.json"
        );
        assert_eq!(client.url_for("tasks"), "https://dav.example.com/files/me/tasks");
        assert_eq!(client.url_for("/"), "https://dav.example.com/files/me/");
    }

    #[test]
    fn invalid_host_is_rejected() {
        let config = RemoteConnectionConfig::new("not a url", "me", "pw");
        assert!(matches!(
            WebDavClient::new(&config, Duration::from_secs(5)),
            Err(RemoteError::Rejected(_))
        ));
    }
}
