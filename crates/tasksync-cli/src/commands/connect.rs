//! Connect and disconnect commands
//!
//! `tasksync connect` checks the settings against the server (PROPFIND on
//! the base URL, MKCOL on the sync collection) and then saves them to
//! `connection.yaml`. `tasksync disconnect` removes that file; later
//! cycles report `disconnected` until the next connect.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use tasksync_core::connection::RemoteConnectionConfig;
use tasksync_core::ports::IRemoteConnector;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ConnectCommand {
    /// WebDAV base URL, e.g. https://cloud.example.com/remote.php/dav/files/me
    pub host: String,

    /// Account name on the server
    #[arg(short, long)]
    pub username: String,

    /// Password or app token; read from standard input when omitted
    #[arg(long)]
    pub credential: Option<String>,

    /// Save the settings without contacting the server
    #[arg(long)]
    pub no_verify: bool,
}

impl ConnectCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();

        let credential = match &self.credential {
            Some(credential) => credential.clone(),
            None => read_credential()?,
        };
        let connection = RemoteConnectionConfig::new(&self.host, &self.username, credential);
        connection.validate()?;

        if !self.no_verify {
            let config = ctx.load_config()?;
            info!(host = %connection.host, "Verifying connection");
            super::connector(&config)
                .connect(&connection)
                .await
                .with_context(|| format!("Could not connect to {}", connection.host))?;
        }

        let path = ctx.connection_path();
        connection.save(&path)?;
        info!(path = %path.display(), "Connection saved");

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "host": connection.host,
                "username": connection.username,
                "verified": !self.no_verify,
                "path": path.display().to_string(),
            }));
        } else {
            formatter.success(&format!(
                "Connected to {} as {}",
                connection.host, connection.username
            ));
            if self.no_verify {
                formatter.warn("Settings were saved without contacting the server");
            }
            formatter.info("Restart or send SIGHUP to a running tasksyncd to use them");
        }
        Ok(())
    }
}

fn read_credential() -> Result<String> {
    eprint!("Credential: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read credential from standard input")?;
    let credential = line.trim_end_matches(['\r', '\n']).to_string();
    if credential.is_empty() {
        anyhow::bail!("No credential given");
    }
    Ok(credential)
}

#[derive(Debug, Args)]
pub struct DisconnectCommand {}

impl DisconnectCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let removed = RemoteConnectionConfig::remove(&ctx.connection_path())?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "was_connected": removed,
            }));
        } else if removed {
            formatter.success("Disconnected; local tasks are kept");
        } else {
            formatter.info("Not connected");
        }
        Ok(())
    }
}
