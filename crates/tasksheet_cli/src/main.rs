mod cli;

use clap::error::ErrorKind as ClapErrorKind;
use clap::{CommandFactory, Parser};
use cli::{Cli, Command, collect_overrides};
use std::io::{self, BufRead};
use std::sync::Arc;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tasksheet_core::config::{self, Config};
use tasksheet_core::error::AppError;
use tasksheet_core::model::{NewSubtask, NewTask, Subtask, Task};
use tasksheet_core::storage::{RowStore, WorkbookStore, workbook_store};
use tasksheet_core::{SaveMode, TaskRepository};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "TASKSHEET_LOG";
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Tabled)]
struct TaskRow<'a> {
    #[tabled(rename = "Task ID")]
    id: u64,
    #[tabled(rename = "Task Name")]
    name: &'a str,
    #[tabled(rename = "Category")]
    category: &'a str,
    #[tabled(rename = "Priority")]
    priority: &'a str,
    #[tabled(rename = "Start Date")]
    start_date: &'a str,
    #[tabled(rename = "Due Date")]
    due_date: &'a str,
    #[tabled(rename = "Status")]
    status: &'a str,
    #[tabled(rename = "Progress")]
    progress: &'a str,
    #[tabled(rename = "Notes")]
    notes: &'a str,
}

impl<'a> From<&'a Task> for TaskRow<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            id: task.id,
            name: &task.name,
            category: &task.category,
            priority: &task.priority,
            start_date: &task.start_date,
            due_date: &task.due_date,
            status: &task.status,
            progress: &task.progress,
            notes: &task.notes,
        }
    }
}

#[derive(Tabled)]
struct SubtaskRow<'a> {
    #[tabled(rename = "Subtask ID")]
    id: u64,
    #[tabled(rename = "Task ID")]
    task_id: u64,
    #[tabled(rename = "Subtask Name")]
    name: &'a str,
    #[tabled(rename = "Subtask Status")]
    status: &'a str,
    #[tabled(rename = "Subtask Progress")]
    progress: &'a str,
    #[tabled(rename = "Subtask Due Date")]
    due_date: &'a str,
    #[tabled(rename = "Subtask Completed Date")]
    completed_date: &'a str,
}

impl<'a> From<&'a Subtask> for SubtaskRow<'a> {
    fn from(subtask: &'a Subtask) -> Self {
        Self {
            id: subtask.id,
            task_id: subtask.task_id,
            name: &subtask.name,
            status: &subtask.status,
            progress: &subtask.progress,
            due_date: &subtask.due_date,
            completed_date: &subtask.completed_date,
        }
    }
}

fn print_task_table<'a>(tasks: impl IntoIterator<Item = &'a Task>) {
    let rows: Vec<TaskRow<'_>> = tasks.into_iter().map(TaskRow::from).collect();
    if rows.is_empty() {
        println!("No tasks.");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn print_subtask_table<'a>(subtasks: impl IntoIterator<Item = &'a Subtask>) {
    let rows: Vec<SubtaskRow<'_>> = subtasks.into_iter().map(SubtaskRow::from).collect();
    if rows.is_empty() {
        println!("No subtasks.");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn today() -> Result<String, AppError> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetDateTime::now_utc()
        .to_offset(offset)
        .date()
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| AppError::invalid_data(err.to_string()))
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

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            quoted = true;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            // `""` is a real, empty argument.
            if !current.is_empty() || quoted {
                args.push(std::mem::take(&mut current));
            }
            quoted = false;
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn open_repository(config: &Config, mode: SaveMode) -> Result<TaskRepository, AppError> {
    let path = workbook_store::store_path(config.store_path.as_deref())?;
    let store: Arc<dyn RowStore> = Arc::new(WorkbookStore::new(path));
    TaskRepository::load(store, mode)
}

fn run_command(command: Command, json: bool, repo: &mut TaskRepository) -> Result<(), AppError> {
    match command {
        Command::Add {
            name,
            category,
            priority,
            start_date,
            due_date,
            status,
            progress,
            notes,
        } => {
            let name = match name {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("task name is required")),
            };
            let start_date = match start_date {
                Some(value) => value,
                None => today()?,
            };

            let task = repo.add_task(NewTask {
                name,
                category,
                priority,
                start_date,
                due_date,
                status,
                progress,
                notes,
            })?;
            if json {
                println!("{}", serde_json::json!(task));
            } else {
                println!("Added task: {} ({})", task.name, task.id);
            }
        }
        Command::AddSubtask {
            task_id,
            name,
            status,
            progress,
            due_date,
            completed_date,
        } => {
            let subtask = repo.add_subtask(NewSubtask {
                task_id,
                name,
                status,
                progress,
                due_date,
                completed_date,
            })?;
            if json {
                println!("{}", serde_json::json!(subtask));
            } else {
                println!(
                    "Added subtask: {} ({}) to task {}",
                    subtask.name, subtask.id, subtask.task_id
                );
            }
        }
        Command::List => {
            if json {
                println!("{}", serde_json::json!(repo.tasks()));
            } else {
                print_task_table(repo.tasks());
            }
        }
        Command::Show { task_id } => {
            let task = repo
                .task(task_id)
                .ok_or_else(|| AppError::task_not_found(task_id))?;
            let subtasks: Vec<&Subtask> = repo.subtasks_for(task_id).collect();
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "task": task,
                        "subtasks": subtasks,
                    })
                );
            } else {
                print_task_table([task]);
                println!();
                print_subtask_table(subtasks);
            }
        }
        Command::Delete { task_id } => {
            let removal = repo.delete_task(task_id)?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "task": removal.task,
                        "subtasks": removal.subtasks,
                    })
                );
            } else {
                match removal.task {
                    Some(task) => println!(
                        "Deleted task: {} ({}) with {} subtask(s)",
                        task.name,
                        task.id,
                        removal.subtasks.len()
                    ),
                    None => println!("No task with id {task_id}; nothing deleted"),
                }
            }
        }
        Command::DeleteSubtask { subtask_id } => {
            let removed = repo.delete_subtask(subtask_id)?;
            if json {
                println!("{}", serde_json::json!({ "subtask": removed }));
            } else {
                match removed {
                    Some(subtask) => println!("Deleted subtask: {} ({})", subtask.name, subtask.id),
                    None => println!("No subtask with id {subtask_id}; nothing deleted"),
                }
            }
        }
    }

    Ok(())
}

fn run_interactive(config: &Config) -> Result<(), AppError> {
    let mut repo = open_repository(config, config.save_mode()?)?;
    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock.read_line(&mut input)?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("tasksheet".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err)
                if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
                ) =>
            {
                println!("{err}");
                continue;
            }
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if !cli.config_override.is_empty() {
            eprintln!(
                "ERROR: {}",
                AppError::invalid_input("config overrides only apply at startup")
            );
            continue;
        }

        let Some(command) = cli.command else {
            continue;
        };

        if let Err(err) = run_command(command, cli.json, &mut repo) {
            eprintln!("ERROR: {}", err);
        }
    }

    repo.flush()
}

fn load_settings(cli: &Cli) -> Result<(Config, Option<AppError>), AppError> {
    let loaded = config::load_config_with_fallback();
    let overrides = collect_overrides(&cli.config_override).map_err(AppError::invalid_input)?;
    let merged = config::merge_overrides(&loaded.config, &overrides)?;
    Ok((merged, loaded.error))
}

/// Installs the global subscriber; call once, from `main`.
fn init_logging(config_level: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(config_level.unwrap_or(DEFAULT_LOG_LEVEL)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err)
            if matches!(
                err.kind(),
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
            ) =>
        {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    let (config, config_error) = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
    };

    init_logging(config.log_level.as_deref());
    if let Some(err) = config_error {
        tracing::warn!(error = %err, "ignoring config file, using defaults");
    }

    let result = match cli.command {
        // One-shot commands write inline so the exit status reflects the save.
        Some(command) => open_repository(&config, SaveMode::Blocking)
            .and_then(|mut repo| run_command(command, cli.json, &mut repo)),
        None => run_interactive(&config),
    };

    if let Err(err) = result {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
