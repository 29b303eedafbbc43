//! Task commands - manage tasks in the local store
//!
//! Every change marks the task `pending` and advances the store's as-of
//! time, so the next sync cycle uploads it.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use tracing::info;

use tasksync_core::domain::{NewTask, Priority, Subtask, SyncStatus, Task, TaskId};
use tasksync_core::ports::ITaskRepository;

use super::CommandContext;
use crate::output::OutputFormatter;

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Create a task
    Add {
        /// Task name
        name: String,
        /// high, medium or low
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Due date, YYYY-MM-DD
        #[arg(short, long)]
        deadline: Option<NaiveDate>,
        /// Comma-separated tags
        #[arg(short, long, default_value = "")]
        tags: String,
        /// Subtask as NAME or NAME:MINUTES (repeatable)
        #[arg(short, long = "subtask", value_parser = parse_subtask)]
        subtasks: Vec<Subtask>,
    },
    /// List tasks
    List {
        /// Only tasks with this sync status (synced, pending, error)
        #[arg(long)]
        status: Option<SyncStatus>,
    },
    /// Show one task with its subtasks
    Show { id: TaskId },
    /// Set completion percentage (clamped to 0..=100)
    Progress {
        id: TaskId,
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Delete a task
    Remove { id: TaskId },
}

impl TaskCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let repo = ctx.open_repository(&config).await?;
        let repo: &dyn ITaskRepository = repo.as_ref();

        match self {
            TaskCommand::Add {
                name,
                priority,
                deadline,
                tags,
                subtasks,
            } => {
                let mut new_task = NewTask::new(name.as_str())
                    .with_priority(*priority)
                    .with_tags(tags.as_str());
                if let Some(deadline) = deadline {
                    new_task = new_task.with_deadline(*deadline);
                }
                for subtask in subtasks {
                    new_task = new_task.with_subtask(subtask.clone());
                }
                new_task.validate()?;

                let task = repo.add_task(&new_task).await?;
                info!(task_id = %task.id(), "Task added");
                if ctx.is_json() {
                    formatter.print_json(&serde_json::to_value(&task)?);
                } else {
                    formatter.success(&format!("Added task {}: {}", task.id(), task.name()));
                }
            }

            TaskCommand::List { status } => {
                let tasks: Vec<Task> = repo
                    .list_tasks()
                    .await?
                    .into_iter()
                    .filter(|t| status.map_or(true, |s| t.sync_status() == s))
                    .collect();

                if ctx.is_json() {
                    formatter.print_json(&serde_json::to_value(&tasks)?);
                } else if tasks.is_empty() {
                    formatter.info("No tasks");
                } else {
                    for task in &tasks {
                        formatter.info(&list_line(task));
                    }
                }
            }

            TaskCommand::Show { id } => {
                let task = find(repo, *id).await?;
                if ctx.is_json() {
                    formatter.print_json(&serde_json::to_value(&task)?);
                } else {
                    show_task(&task, formatter.as_ref());
                }
            }

            TaskCommand::Progress { id, value } => {
                let task = find(repo, *id).await?.with_progress(*value);
                repo.update_task(&task).await?;
                info!(task_id = %id, progress = task.progress(), "Progress updated");
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "id": id.as_i64(),
                        "progress": task.progress(),
                    }));
                } else {
                    formatter.success(&format!("Task {id} is {}% done", task.progress()));
                }
            }

            TaskCommand::Remove { id } => {
                if !repo.delete_task(*id).await? {
                    anyhow::bail!("No task with id {id}");
                }
                info!(task_id = %id, "Task removed");
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({"success": true, "id": id.as_i64()}));
                } else {
                    formatter.success(&format!("Removed task {id}"));
                }
            }
        }
        Ok(())
    }
}

async fn find(repo: &dyn ITaskRepository, id: TaskId) -> Result<Task> {
    repo.get_task(id)
        .await?
        .with_context(|| format!("No task with id {id}"))
}

/// Parse `NAME` or `NAME:MINUTES`
fn parse_subtask(input: &str) -> Result<Subtask, String> {
    let (name, minutes) = match input.rsplit_once(':') {
        Some((name, minutes)) => {
            let minutes: u32 = minutes
                .trim()
                .parse()
                .map_err(|_| format!("invalid minutes in '{input}'"))?;
            (name, minutes)
        }
        None => (input, 0),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("subtask name must not be empty".to_string());
    }
    Ok(Subtask::new(name, minutes))
}

fn list_line(task: &Task) -> String {
    let deadline = task.deadline().unwrap_or("-");
    format!(
        "{:>4}  {:<7} {:>3}%  {:<10}  {:<7}  {}",
        task.id().as_i64(),
        task.priority().as_str(),
        task.progress(),
        deadline,
        task.sync_status().as_str(),
        task.name()
    )
}

fn show_task(task: &Task, formatter: &dyn OutputFormatter) {
    formatter.success(&format!("Task {}: {}", task.id(), task.name()));
    formatter.field("Priority", &task.priority());
    formatter.field("Deadline", &task.deadline().unwrap_or("-"));
    formatter.field("Progress", &format!("{}%", task.progress()));
    if !task.tags().is_empty() {
        formatter.field("Tags", &task.tags());
    }
    formatter.field("Created", &task.created_at().format("%Y-%m-%d %H:%M"));
    formatter.field("Sync status", &task.sync_status());
    formatter.field("Sync version", &task.sync_version());
    if let Some(last) = task.last_sync() {
        formatter.field("Last sync", &last.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    for subtask in task.subtasks() {
        formatter.info(&format!(
            "  [{}] {} ({}/{} min)",
            subtask.status.as_str(),
            subtask.name,
            subtask.completed_minutes,
            subtask.target_minutes
        ));
    }
}
