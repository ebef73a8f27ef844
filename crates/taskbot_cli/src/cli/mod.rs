use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskbot_core::config::{ConfigKey, ConfigOverrides};
use taskbot_core::error::AppError;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,

    /// Keep tasks in a local JSON file instead of the task backend
    #[arg(long = "store-file", value_name = "PATH", global = true, env = "TASKBOT_STORE_FILE")]
    pub store_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat HTTP endpoint
    ///
    /// Example: taskbot serve --bind 0.0.0.0:8001
    Serve {
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Chat with the assistant on stdin
    ///
    /// Example: taskbot chat --user alice --token abc123
    /// Example: taskbot chat --user alice -m "show my tasks"
    Chat {
        #[arg(long, env = "TASKBOT_USER")]
        user: String,
        #[arg(long, env = "TASKBOT_TOKEN", default_value = "", hide_env_values = true)]
        token: String,
        /// Send one message and exit
        #[arg(short = 'm', long = "message", value_name = "MESSAGE")]
        message: Option<String>,
    },
    /// Manage tasks directly
    Tasks {
        #[arg(
            long,
            env = "TASKBOT_TOKEN",
            default_value = "",
            hide_env_values = true,
            global = true
        )]
        token: String,
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Inspect or call the tool-calling surface
    Tools {
        #[arg(
            long,
            env = "TASKBOT_TOKEN",
            default_value = "",
            hide_env_values = true,
            global = true
        )]
        token: String,
        #[command(subcommand)]
        command: ToolCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List tasks, pending first
    ///
    /// Example: taskbot tasks list --table
    List {
        #[arg(long)]
        table: bool,
    },
    /// Show details of a task
    ///
    /// Example: taskbot tasks show 3
    Show { id: i64 },
    /// Add a new task
    ///
    /// Example: taskbot tasks add "Buy milk" --priority high --due 2026-01-05
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        priority: String,
        #[arg(long = "due", value_name = "YYYY-MM-DD", default_value = "")]
        due_date: String,
        #[arg(long, default_value = "")]
        category: String,
    },
    /// Change fields of a task
    ///
    /// Example: taskbot tasks update 3 --priority low
    Update {
        id: i64,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        status: String,
        #[arg(long, default_value = "")]
        priority: String,
        #[arg(long = "due", value_name = "YYYY-MM-DD", default_value = "")]
        due_date: String,
        #[arg(long, default_value = "")]
        category: String,
    },
    /// Mark a task as completed
    ///
    /// Example: taskbot tasks done 3
    Done { id: i64 },
    /// Delete a task
    ///
    /// Example: taskbot tasks delete 3
    Delete { id: i64 },
    /// List tasks in a category
    ///
    /// Example: taskbot tasks search work
    Search { category: String },
}

#[derive(Subcommand, Debug)]
pub enum ToolCommand {
    /// Print the tool definitions as JSON
    List,
    /// Run one tool and print its text result
    ///
    /// Example: taskbot tools call get_task --args '{"task_id": 3}'
    Call {
        name: String,
        #[arg(long, value_name = "JSON", default_value = "{}")]
        args: String,
    },
}

/// Flag name used to identify config override arguments by the runtime.
pub const CONFIG_OVERRIDE_FLAG: &str = "--config-override";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub key: ConfigKey,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a known config key.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    if key_raw.trim().is_empty() {
        return Err("override key cannot be empty".to_string());
    }
    let key = ConfigKey::parse(key_raw)
        .ok_or_else(|| format!("unknown config field '{}'", key_raw.trim()))?;

    Ok(ParsedConfigOverride {
        key,
        value: value_raw.trim().to_string(),
    })
}

/// Collects every `--config-override` into one override set.
pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)
            .map_err(|message| AppError::invalid_input(format!("{CONFIG_OVERRIDE_FLAG}: {message}")))?;
        overrides.set(parsed.key, &parsed.value)?;
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, TaskCommand, collect_overrides, parse_config_override};
    use clap::Parser;
    use taskbot_core::config::{ConfigKey, CreateTaskMode};

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" Create-Task Mode = guided ").unwrap();

        assert_eq!(parsed.key, ConfigKey::CreateTaskMode);
        assert_eq!(parsed.value, "guided");
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("unknown.field=value").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("backend_url").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn parse_config_override_rejects_empty_key() {
        let err = parse_config_override(" =x").unwrap_err();
        assert!(err.contains("cannot be empty"));
    }

    #[test]
    fn collect_overrides_validates_values() {
        let overrides = collect_overrides(&[
            "create_task_mode=guided".to_string(),
            "timeout=5".to_string(),
        ])
        .unwrap();
        assert_eq!(overrides.create_task_mode, Some(CreateTaskMode::Guided));
        assert_eq!(overrides.request_timeout_secs, Some(5));

        let err = collect_overrides(&["timeout=soon".to_string()]).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn task_token_is_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from(["taskbot", "tasks", "done", "4", "--token", "abc"]).unwrap();

        match cli.command {
            Command::Tasks { token, command } => {
                assert_eq!(token, "abc");
                assert!(matches!(command, TaskCommand::Done { id: 4 }));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
