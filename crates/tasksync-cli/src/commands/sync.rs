//! Sync command - run one sync cycle in the foreground
//!
//! Builds the same orchestrator the daemon uses, loads the saved
//! connection and runs a single cycle. The outcome is printed; a failed
//! cycle is also recorded in the sync log like any scheduled one.
//!
//! The cycle takes the store-wide sync lease, so it is dropped rather than
//! run alongside a cycle of a running `tasksyncd`.

use anyhow::Result;
use clap::Args;
use tracing::info;

use tasksync_sync::{SyncOrchestrator, SyncOutcome};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let repo = ctx.open_repository(&config).await?;
        let orchestrator =
            SyncOrchestrator::new(repo, std::sync::Arc::new(super::connector(&config)), &config)?;
        orchestrator.set_connection(ctx.load_connection()?).await;

        info!("Running sync cycle");
        let Some(outcome) = orchestrator.try_run_cycle().await else {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({"outcome": "dropped"}));
            } else {
                formatter.warn("A sync cycle is already running (tasksyncd?), nothing done");
            }
            return Ok(());
        };

        if ctx.is_json() {
            formatter.print_json(&outcome_json(&outcome));
            return Ok(());
        }

        match &outcome {
            SyncOutcome::Success(report) => {
                formatter.success(&format!("Sync complete: {}", report.summary()));
                formatter.field("Cycle", &report.cycle_id);
                formatter.field("Duration", &format!("{}ms", report.duration.as_millis()));
            }
            SyncOutcome::Disconnected => {
                formatter.warn("Not connected. Run 'tasksync connect' first.");
            }
            SyncOutcome::Error(message) => {
                formatter.error(&format!("Sync failed: {message}"));
                formatter.info("Details are in 'tasksync log'");
            }
        }
        Ok(())
    }
}

pub(crate) fn outcome_json(outcome: &SyncOutcome) -> serde_json::Value {
    match outcome {
        SyncOutcome::Success(report) => serde_json::json!({
            "outcome": outcome.label(),
            "cycle_id": report.cycle_id.to_string(),
            "action": report.action.as_str(),
            "tasks_synced": report.tasks_synced,
            "tasks_imported": report.tasks_imported,
            "duration_ms": report.duration.as_millis() as u64,
        }),
        SyncOutcome::Disconnected => serde_json::json!({
            "outcome": outcome.label(),
        }),
        SyncOutcome::Error(message) => serde_json::json!({
            "outcome": outcome.label(),
            "error": message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tasksync_core::domain::CycleId;
    use tasksync_sync::{CycleReport, SyncAction};

    #[test]
    fn success_json_carries_counts() {
        let outcome = SyncOutcome::Success(CycleReport {
            cycle_id: CycleId::new(),
            action: SyncAction::UploadLocal,
            tasks_synced: 3,
            tasks_imported: 0,
            duration: Duration::from_millis(42),
        });
        let json = outcome_json(&outcome);
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["action"], SyncAction::UploadLocal.as_str());
        assert_eq!(json["tasks_synced"], 3);
        assert_eq!(json["duration_ms"], 42);
    }

    #[test]
    fn error_json_keeps_message() {
        let json = outcome_json(&SyncOutcome::Error("remote unavailable: timeout".into()));
        assert_eq!(json["outcome"], "error");
        assert_eq!(json["error"], "remote unavailable: timeout");
    }

    #[tokio::test]
    async fn sync_without_connection_reports_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let db = dir.path().join("tasks.db");
        std::fs::write(
            &config_path,
            format!("storage:\n  database: {}\n", db.display()),
        )
        .unwrap();
        let ctx = CommandContext::new(crate::output::OutputFormat::Json, config_path.to_str());

        SyncCommand {}.execute(&ctx).await.unwrap();
        assert!(db.exists());
    }

    #[tokio::test]
    async fn sync_while_lease_is_held_leaves_it_alone() {
        use tasksync_core::ports::ITaskRepository;

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            format!(
                "storage:\n  database: {}\n",
                dir.path().join("tasks.db").display()
            ),
        )
        .unwrap();
        let ctx = CommandContext::new(crate::output::OutputFormat::Json, config_path.to_str());
        let config = ctx.load_config().unwrap();
        let repo = ctx.open_repository(&config).await.unwrap();
        let lease = chrono::Duration::minutes(5);
        assert!(repo.try_acquire_sync_lease("daemon", lease).await.unwrap());

        SyncCommand {}.execute(&ctx).await.unwrap();

        // Still held by the daemon, and nothing was logged for a dropped run
        assert!(!repo.try_acquire_sync_lease("other", lease).await.unwrap());
        assert!(repo.recent_sync_log(10).await.unwrap().is_empty());
    }
}
