use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tasksheet_core::config::{ConfigOverrides, canonical_key};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to run; starts an interactive session when omitted
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: tasksheet add "Write report" --category Work --priority High
    Add {
        name: Option<String>,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        priority: String,
        /// Defaults to today's date
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long, default_value = "")]
        due_date: String,
        #[arg(long, default_value = "")]
        status: String,
        #[arg(long, default_value = "")]
        progress: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Add a subtask to an existing task
    ///
    /// Example: tasksheet add-subtask 1 "Collect figures" --due-date 2024-01-15
    AddSubtask {
        task_id: u64,
        name: String,
        #[arg(long, default_value = "")]
        status: String,
        #[arg(long, default_value = "")]
        progress: String,
        #[arg(long, default_value = "")]
        due_date: String,
        #[arg(long, default_value = "")]
        completed_date: String,
    },
    /// List all tasks
    ///
    /// Example: tasksheet list
    List,
    /// Show a task and its subtasks
    ///
    /// Example: tasksheet show 1
    Show {
        task_id: u64,
    },
    /// Delete a task together with its subtasks
    ///
    /// Example: tasksheet delete 1
    Delete {
        task_id: u64,
    },
    /// Delete a single subtask
    ///
    /// Example: tasksheet delete-subtask 3
    DeleteSubtask {
        subtask_id: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    StorePath,
    SaveMode,
    LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let key = canonical_key(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match key.as_str() {
        "store_path" | "store" => ConfigOverrideTarget::StorePath,
        "save_mode" => ConfigOverrideTarget::SaveMode,
        "log_level" | "log" => ConfigOverrideTarget::LogLevel,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("override '{key}' needs a value"));
    }

    Ok(ParsedConfigOverride { target, value })
}

/// Folds every `--config-override` argument into one set of overrides;
/// later values win.
pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)?;
        match parsed.target {
            ConfigOverrideTarget::StorePath => {
                overrides.store_path = Some(PathBuf::from(parsed.value));
            }
            ConfigOverrideTarget::SaveMode => overrides.save_mode = Some(parsed.value),
            ConfigOverrideTarget::LogLevel => overrides.log_level = Some(parsed.value),
        }
    }
    Ok(overrides)
}
