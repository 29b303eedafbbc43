//! Human and JSON renderings of command results

use std::fmt::Display;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }

    pub fn is_json(self) -> bool {
        self == Self::Json
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Success,
    Error,
    Warn,
    Info,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    /// Aligned `label: value` line
    fn field(&self, label: &str, value: &dyn Display);
    fn print_json(&self, value: &serde_json::Value);
}

fn human_line(level: Level, message: &str) -> String {
    match level {
        Level::Success => format!("\u{2713} {message}"),
        Level::Error => format!("\u{2717} Error: {message}"),
        Level::Warn => format!("\u{26a0} Warning: {message}"),
        Level::Info => format!("  {message}"),
    }
}

fn json_line(level: Level, message: &str) -> Option<serde_json::Value> {
    match level {
        Level::Success => Some(serde_json::json!({"success": true, "message": message})),
        Level::Error => Some(serde_json::json!({"success": false, "error": message})),
        Level::Warn => Some(serde_json::json!({"level": "warning", "message": message})),
        Level::Info => None,
    }
}

fn field_line(label: &str, value: &dyn Display) -> String {
    format!("  {:<14} {}", format!("{label}:"), value)
}

/// Human-readable output with status marks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("{}", human_line(Level::Success, message));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", human_line(Level::Error, message));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", human_line(Level::Warn, message));
    }
    fn info(&self, message: &str) {
        println!("{}", human_line(Level::Info, message));
    }
    fn field(&self, label: &str, value: &dyn Display) {
        println!("{}", field_line(label, value));
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output; informational lines are dropped
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        if let Some(line) = json_line(Level::Success, message) {
            println!("{line}");
        }
    }
    fn error(&self, message: &str) {
        if let Some(line) = json_line(Level::Error, message) {
            eprintln!("{line}");
        }
    }
    fn warn(&self, message: &str) {
        if let Some(line) = json_line(Level::Warn, message) {
            eprintln!("{line}");
        }
    }
    fn info(&self, _message: &str) {}
    fn field(&self, _label: &str, _value: &dyn Display) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}
