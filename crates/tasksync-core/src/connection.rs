//! Remote connection settings
//!
//! Host, username and credential for the remote store. They are kept in
//! their own file (`connection.yaml`), apart from task data and from
//! [`crate::config::Config`], and the file is only readable by its owner.
//! An absent file means the client is disconnected.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::config_dir;
use crate::domain::DomainError;

const CONNECTION_FILE: &str = "connection.yaml";

/// Credentials and endpoint of the remote store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConnectionConfig {
    /// Base URL of the WebDAV server, e.g. `https://dav.example.com/remote.php/dav/files/me`
    pub host: String,
    pub username: String,
    /// Opaque secret sent as the HTTP Basic password
    pub credential: String,
}

impl fmt::Debug for RemoteConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnectionConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("credential", &"<redacted>")
            .finish()
    }
}

impl RemoteConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            credential: credential.into(),
        }
    }

    /// Default location: `$XDG_CONFIG_HOME/tasksync/connection.yaml`
    pub fn default_path() -> PathBuf {
        config_dir().join(CONNECTION_FILE)
    }

    /// Location used alongside a configuration file at `config_path`
    pub fn path_for_config(config_path: &Path) -> PathBuf {
        config_path.with_file_name(CONNECTION_FILE)
    }

    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url, DomainError> {
        let url = Url::parse(self.host.trim())
            .map_err(|e| DomainError::InvalidConnection(format!("host '{}': {e}", self.host)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(DomainError::InvalidConnection(format!(
                "unsupported scheme '{other}', expected http or https"
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.base_url()?;
        if self.username.trim().is_empty() {
            return Err(DomainError::InvalidConnection(
                "username must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Load saved settings; `Ok(None)` when no connection has been configured
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(config))
    }

    /// Persist settings, readable by the owner only
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
        }

        Ok(())
    }

    /// Delete saved settings; returns whether a file was removed
    pub fn remove(path: &Path) -> anyhow::Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RemoteConnectionConfig {
        RemoteConnectionConfig::new("https://dav.example.com/files", "alice", "s3cret")
    }

    #[test]
    fn debug_output_redacts_credential() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn validate_accepts_http_urls() {
        assert!(sample().validate().is_ok());
        let plain = RemoteConnectionConfig::new("http://localhost:8080", "bob", "");
        assert!(plain.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_host_and_empty_username() {
        let bad_host = RemoteConnectionConfig::new("dav.example.com", "alice", "x");
        assert!(bad_host.validate().is_err());

        let ftp = RemoteConnectionConfig::new("ftp://dav.example.com", "alice", "x");
        assert!(ftp.validate().is_err());

        let no_user = RemoteConnectionConfig::new("https://dav.example.com", " ", "x");
        assert!(no_user.validate().is_err());
    }

    #[test]
    fn load_missing_file_means_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RemoteConnectionConfig::load(&dir.path().join("connection.yaml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_load_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("connection.yaml");

        sample().save(&path).unwrap();
        let loaded = RemoteConnectionConfig::load(&path).unwrap();
        assert_eq!(loaded, Some(sample()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(RemoteConnectionConfig::remove(&path).unwrap());
        assert!(!RemoteConnectionConfig::remove(&path).unwrap());
        assert!(RemoteConnectionConfig::load(&path).unwrap().is_none());
    }

    #[test]
    fn path_for_config_is_a_sibling() {
        let path = RemoteConnectionConfig::path_for_config(Path::new("/srv/tasksync/alt.yaml"));
        assert_eq!(path, PathBuf::from("/srv/tasksync/connection.yaml"));
    }
}
