//! Log command - recent sync log entries, newest first

use anyhow::{Context, Result};
use clap::Args;

use tasksync_core::domain::SyncLogEntry;
use tasksync_core::ports::ITaskRepository;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct LogCommand {
    /// Maximum number of entries to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: u32,

    /// Only failed steps
    #[arg(long)]
    pub errors: bool,
}

impl LogCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let repo = ctx.open_repository(&config).await?;

        let entries: Vec<SyncLogEntry> = repo
            .recent_sync_log(self.limit)
            .await
            .context("Failed to read sync log")?
            .into_iter()
            .filter(|e| !self.errors || e.is_error())
            .collect();

        if ctx.is_json() {
            let json: Vec<serde_json::Value> = entries.iter().map(entry_json).collect();
            formatter.print_json(&serde_json::Value::Array(json));
            return Ok(());
        }

        if entries.is_empty() {
            formatter.info("No sync log entries");
            return Ok(());
        }
        for entry in &entries {
            formatter.info(&entry_line(entry));
            if let Some(reason) = entry.reason() {
                formatter.info(&format!("    {}", reason.description()));
            }
        }
        Ok(())
    }
}

fn entry_line(entry: &SyncLogEntry) -> String {
    let mut line = format!(
        "{}  {:<7}",
        entry.timestamp().format("%Y-%m-%d %H:%M:%S"),
        entry.outcome().as_str()
    );
    if let Some(reason) = entry.reason() {
        line.push_str(&format!(" [{reason}]"));
    }
    if let Some(task_id) = entry.task_id() {
        line.push_str(&format!(" task {task_id}:"));
    }
    line.push(' ');
    line.push_str(entry.message());
    line
}

fn entry_json(entry: &SyncLogEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id(),
        "timestamp": entry.timestamp().to_rfc3339(),
        "cycle_id": entry.cycle_id().map(|id| id.to_string()),
        "task_id": entry.task_id().map(|id| id.as_i64()),
        "outcome": entry.outcome().as_str(),
        "reason": entry.reason().map(|r| r.as_str()),
        "message": entry.message(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tasksync_core::domain::{ReasonCode, TaskId};

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 10, 15, 30).unwrap()
    }

    #[test]
    fn success_line() {
        let entry = SyncLogEntry::success("uploaded 2 task(s)").with_timestamp(at());
        assert_eq!(
            entry_line(&entry),
            "2025-03-04 10:15:30  success uploaded 2 task(s)"
        );
    }

    #[test]
    fn task_error_line_names_reason_and_task() {
        let entry = SyncLogEntry::error(ReasonCode::Encode, "name is not valid UTF-8")
            .with_task(TaskId::new(4))
            .with_timestamp(at());
        let line = entry_line(&entry);
        assert!(line.contains("error   [encode] task 4: name is not valid UTF-8"), "{line}");
    }

    #[test]
    fn json_uses_stable_codes() {
        let entry = SyncLogEntry::error(ReasonCode::RemoteUnavailable, "timed out");
        let json = entry_json(&entry);
        assert_eq!(json["outcome"], "error");
        assert_eq!(json["reason"], "remote_unavailable");
        assert!(json["task_id"].is_null());
    }
}
