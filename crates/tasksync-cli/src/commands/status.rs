//! Status command - connection, task counts and the latest sync result

use anyhow::{Context, Result};
use clap::Args;

use tasksync_core::domain::{SyncStatus, Task};
use tasksync_core::ports::ITaskRepository;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct StatusCommand {}

/// Tasks per sync status
#[derive(Debug, Default, PartialEq, Eq)]
struct StatusCounts {
    synced: usize,
    pending: usize,
    error: usize,
}

impl StatusCounts {
    fn of(tasks: &[Task]) -> Self {
        tasks.iter().fold(Self::default(), |mut counts, task| {
            match task.sync_status() {
                SyncStatus::Synced => counts.synced += 1,
                SyncStatus::Pending => counts.pending += 1,
                SyncStatus::Error => counts.error += 1,
            }
            counts
        })
    }

    fn total(&self) -> usize {
        self.synced + self.pending + self.error
    }
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let connection = ctx.load_connection()?;
        let repo = ctx.open_repository(&config).await?;

        let tasks = repo.list_tasks().await.context("Failed to list tasks")?;
        let counts = StatusCounts::of(&tasks);
        let as_of = repo.as_of().await?;
        let last = repo.recent_sync_log(1).await?.into_iter().next();

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "connected": connection.is_some(),
                "host": connection.as_ref().map(|c| c.host.clone()),
                "username": connection.as_ref().map(|c| c.username.clone()),
                "database": config.storage.database.display().to_string(),
                "as_of": as_of.to_rfc3339(),
                "tasks": {
                    "total": counts.total(),
                    "synced": counts.synced,
                    "pending": counts.pending,
                    "error": counts.error,
                },
                "last_sync": last.as_ref().map(|e| serde_json::json!({
                    "timestamp": e.timestamp().to_rfc3339(),
                    "outcome": e.outcome().as_str(),
                    "message": e.message(),
                })),
            }));
            return Ok(());
        }

        match &connection {
            Some(c) => formatter.success(&format!("Connected to {} as {}", c.host, c.username)),
            None => formatter.warn("Not connected. Run 'tasksync connect' to enable sync."),
        }
        formatter.field("Database", &config.storage.database.display());
        formatter.field(
            "Tasks",
            &format!(
                "{} ({} synced, {} pending, {} error)",
                counts.total(),
                counts.synced,
                counts.pending,
                counts.error
            ),
        );
        formatter.field("Data as of", &as_of.format("%Y-%m-%d %H:%M:%S UTC"));
        match last {
            Some(entry) => formatter.field(
                "Last sync",
                &format!(
                    "{} {} ({})",
                    entry.timestamp().format("%Y-%m-%d %H:%M:%S"),
                    entry.outcome().as_str(),
                    entry.message()
                ),
            ),
            None => formatter.field("Last sync", &"never"),
        }
        Ok(())
    }
}
