//! Config command - view and check tasksync configuration
//!
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports every error
//! 3. Prints the files tasksync reads and writes

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use tasksync_core::config::{Config, ValidationError};

use super::CommandContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Show configuration, connection and database paths
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Validate => execute_validate(ctx),
            ConfigCommand::Path => execute_path(ctx),
        }
    }
}

fn execute_show(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config = ctx.read_config()?;
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if ctx.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    let source = if ctx.config_path.exists() {
        ctx.config_path.display().to_string()
    } else {
        format!("defaults, {} not found", ctx.config_path.display())
    };
    formatter.success(&format!("Configuration ({source})"));
    formatter.info("");
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
    for line in yaml.lines() {
        formatter.info(line);
    }
    Ok(())
}

fn execute_validate(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();

    // Unlike `show`, a missing file is reported rather than defaulted.
    let config = match Config::load(&ctx.config_path) {
        Ok(config) => config,
        Err(e) => {
            let message = format!("Cannot load {}: {e}", ctx.config_path.display());
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "path": ctx.config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
            }
            return Ok(());
        }
    };

    let errors = config.validate();
    if ctx.is_json() {
        formatter.print_json(&validation_json(&ctx.config_path.display().to_string(), &errors));
    } else if errors.is_empty() {
        formatter.success(&format!("{} is valid", ctx.config_path.display()));
    } else {
        formatter.error(&format!(
            "{} has {} error(s)",
            ctx.config_path.display(),
            errors.len()
        ));
        for error in &errors {
            formatter.info(&error.to_string());
        }
    }
    Ok(())
}

fn execute_path(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config = ctx.read_config()?;
    let connection = ctx.connection_path();

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "config": ctx.config_path.display().to_string(),
            "connection": connection.display().to_string(),
            "database": config.storage.database.display().to_string(),
        }));
    } else {
        formatter.field("Config", &ctx.config_path.display());
        formatter.field("Connection", &connection.display());
        formatter.field("Database", &config.storage.database.display());
    }
    Ok(())
}

fn validation_json(path: &str, errors: &[ValidationError]) -> serde_json::Value {
    serde_json::json!({
        "valid": errors.is_empty(),
        "path": path,
        "errors": errors
            .iter()
            .map(|e| serde_json::json!({"field": e.field, "message": e.message}))
            .collect::<Vec<_>>(),
    })
}
