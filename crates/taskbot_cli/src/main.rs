use clap::error::ErrorKind;
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use taskbot_cli::cli::{Cli, Command, TaskCommand, ToolCommand, collect_overrides};
use taskbot_core::config::{Config, load_config_with_fallback, merge_overrides};
use taskbot_core::dialogue::{DialogueEngine, DialogueReply};
use taskbot_core::error::AppError;
use taskbot_core::llm::{OpenAiCompatibleGenerator, TextGenerator};
use taskbot_core::model::{Task, TaskStatus, TaskUpdate};
use taskbot_core::server;
use taskbot_core::session::{InMemorySessionStore, SessionStore};
use taskbot_core::storage::{HttpTaskStore, JsonTaskStore, TaskStore};
use taskbot_core::tools::{
    ToolAdapter, format_completed, format_created, format_deleted, format_search_results,
    format_task_details, format_task_list, format_updated, new_task_from_text, update_from_text,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CHAT_HELP: &str = "Talk to the assistant in plain language, for example:
  create a task
  show my tasks
  mark task #3 as done
  change task 3 to high priority
  delete task #3
Say \"cancel\" while creating a task to stop. Type \"exit\" or \"quit\" to leave.";

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Category")]
    category: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            status: task.status.to_string(),
            priority: format!("{} {}", task.priority.icon(), task.priority),
            due: task.due_date.clone().unwrap_or_else(|| "-".to_string()),
            category: task.category.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn print_table(tasks: &[Task]) {
    let rows: Vec<TaskRow> = tasks.iter().map(TaskRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn init_tracing(command: &Command) {
    let default_level = match command {
        Command::Serve { .. } => "taskbot=info",
        _ => "taskbot=warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, AppError> {
    let load = load_config_with_fallback();
    if let Some(err) = load.error.as_ref() {
        warn!(code = err.code(), "config not loaded, using defaults: {}", err.message());
    }
    let overrides = collect_overrides(&cli.config_override)?;
    Ok(merge_overrides(&load.config, &overrides))
}

fn task_store(store_file: Option<&Path>, config: &Config) -> Result<Arc<dyn TaskStore>, AppError> {
    match store_file {
        Some(path) => {
            info!(path = %path.display(), "using local task file");
            let store: Arc<dyn TaskStore> = Arc::new(JsonTaskStore::new(path));
            Ok(store)
        }
        None => {
            let store: Arc<dyn TaskStore> = Arc::new(HttpTaskStore::new(
                &config.backend_url,
                config.request_timeout(),
            )?);
            Ok(store)
        }
    }
}

fn build_engine(config: &Config, tools: ToolAdapter) -> Result<DialogueEngine, AppError> {
    let generator = OpenAiCompatibleGenerator::from_config(config)?
        .map(|generator| Arc::new(generator) as Arc<dyn TextGenerator>);
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    Ok(DialogueEngine::from_config(config, tools, sessions, generator))
}

fn require_token(token: &str) -> Result<(), AppError> {
    if token.trim().is_empty() {
        return Err(AppError::AuthenticationMissing(
            "authentication token is required; pass --token or set TASKBOT_TOKEN".to_string(),
        ));
    }
    Ok(())
}

fn print_reply(reply: &DialogueReply, json: bool) -> Result<(), AppError> {
    if json {
        print_json(reply)
    } else {
        println!("{}\n", reply.text);
        Ok(())
    }
}

async fn run_chat(
    engine: &DialogueEngine,
    user: &str,
    token: &str,
    json: bool,
) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| AppError::io(err.to_string()))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            println!("{CHAT_HELP}\n");
            continue;
        }

        let reply = engine.handle(user, line, token).await;
        print_reply(&reply, json)?;
    }

    Ok(())
}

async fn run_tasks(
    tools: &ToolAdapter,
    token: &str,
    command: TaskCommand,
    json: bool,
) -> Result<(), AppError> {
    require_token(token)?;

    match command {
        TaskCommand::List { table } => {
            let tasks = tools.fetch_all(token).await?;
            if json {
                print_json(&tasks)?;
            } else if table {
                print_table(&tasks);
            } else {
                println!("{}", format_task_list(&tasks));
            }
        }
        TaskCommand::Show { id } => {
            let task = tools.fetch(token, id).await?;
            if json {
                print_json(&task)?;
            } else {
                println!("{}", format_task_details(&task));
            }
        }
        TaskCommand::Add {
            title,
            description,
            priority,
            due_date,
            category,
        } => {
            let new_task = new_task_from_text(&title, &description, &priority, &due_date, &category)?;
            let task = tools.submit(token, &new_task).await?;
            if json {
                print_json(&task)?;
            } else {
                println!("{}", format_created(&task));
            }
        }
        TaskCommand::Update {
            id,
            title,
            description,
            status,
            priority,
            due_date,
            category,
        } => {
            let update =
                update_from_text(&title, &description, &status, &priority, &due_date, &category)?;
            let task = tools.apply_update(token, id, &update).await?;
            if json {
                print_json(&task)?;
            } else {
                println!("{}", format_updated(&task));
            }
        }
        TaskCommand::Done { id } => {
            let task = tools
                .apply_update(token, id, &TaskUpdate::status(TaskStatus::Completed))
                .await?;
            if json {
                print_json(&task)?;
            } else {
                println!("{}", format_completed(&task));
            }
        }
        TaskCommand::Delete { id } => {
            tools.remove(token, id).await?;
            if json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                println!("{}", format_deleted(id));
            }
        }
        TaskCommand::Search { category } => {
            let tasks = tools.search(token, &category).await?;
            if json {
                print_json(&tasks)?;
            } else {
                println!("{}", format_search_results(category.trim(), &tasks));
            }
        }
    }

    Ok(())
}

async fn run_tools(tools: &ToolAdapter, token: &str, command: ToolCommand) -> Result<(), AppError> {
    match command {
        ToolCommand::List => {
            let definitions = ToolAdapter::definitions();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        ToolCommand::Call { name, args } => {
            let arguments: serde_json::Value = serde_json::from_str(&args).map_err(|err| {
                AppError::invalid_input(format!("--args must be a JSON object: {err}"))
            })?;
            if !arguments.is_object() {
                return Err(AppError::invalid_input("--args must be a JSON object"));
            }
            println!("{}", tools.invoke(&name, &arguments, token).await);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("could not listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn run_command(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;
    let json = cli.json;
    let store = task_store(cli.store_file.as_deref(), &config)?;
    let tools = ToolAdapter::new(store);

    match cli.command {
        Command::Serve { bind } => {
            let address = bind.unwrap_or_else(|| config.bind_address.clone());
            let engine = Arc::new(build_engine(&config, tools)?);
            let listener = tokio::net::TcpListener::bind(&address)
                .await
                .map_err(|err| AppError::io(format!("cannot bind {address}: {err}")))?;
            let sweep_every = server::sweep_interval(config.session_idle_timeout());
            server::serve(listener, engine, sweep_every, shutdown_signal()).await?;
        }
        Command::Chat {
            user,
            token,
            message,
        } => {
            if user.trim().is_empty() {
                return Err(AppError::invalid_input("--user cannot be empty"));
            }
            let engine = build_engine(&config, tools)?;
            match message {
                Some(message) => {
                    let reply = engine.handle(&user, &message, &token).await;
                    print_reply(&reply, json)?;
                }
                None => run_chat(&engine, &user, &token, json).await?,
            }
        }
        Command::Tasks { token, command } => run_tasks(&tools, &token, command, json).await?,
        Command::Tools { token, command } => run_tools(&tools, &token, command).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    init_tracing(&cli.command);

    if let Err(err) = run_command(cli).await {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, normalize_parse_error};
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_errors_keep_first_line_only() {
        let err = Cli::command()
            .try_get_matches_from(["taskbot", "fly"])
            .unwrap_err();

        let normalized = normalize_parse_error(err);

        assert_eq!(normalized.code(), "invalid_input");
        assert!(normalized.message().contains("unrecognized subcommand"));
        assert!(!normalized.message().contains('\n'));
    }
}
