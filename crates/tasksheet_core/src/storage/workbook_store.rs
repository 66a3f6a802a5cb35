use super::{RowStore, TaskState};
use crate::config;
use crate::error::AppError;
use crate::model::{Subtask, Task};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const TASK_SHEET: &str = "Main Tasks";
pub const SUBTASK_SHEET: &str = "Subtasks";

pub const TASK_HEADERS: [&str; 9] = [
    "Task ID",
    "Task Name",
    "Category",
    "Priority",
    "Start Date",
    "Due Date",
    "Status",
    "Progress",
    "Notes",
];

pub const SUBTASK_HEADERS: [&str; 7] = [
    "Subtask ID",
    "Task ID",
    "Subtask Name",
    "Subtask Status",
    "Subtask Progress",
    "Subtask Due Date",
    "Subtask Completed Date",
];

const STORE_FILE_NAME: &str = "task_manager_data.json";
const STORE_ENV_VAR: &str = "TASKSHEET_STORE_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Workbook {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sheet {
    name: String,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

impl Workbook {
    fn with_task_sheets(tasks: &[Task], subtasks: &[Subtask]) -> Self {
        let mut workbook = Workbook::default();
        workbook.replace_task_sheets(tasks, subtasks);
        workbook
    }

    fn sheet(&self, name: &str) -> Result<&Sheet, AppError> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| AppError::invalid_data(format!("sheet '{name}' is missing")))
    }

    /// Drops the existing task sheets and appends fresh ones. Any other
    /// sheet keeps its place and contents.
    fn replace_task_sheets(&mut self, tasks: &[Task], subtasks: &[Subtask]) {
        self.sheets
            .retain(|sheet| sheet.name != TASK_SHEET && sheet.name != SUBTASK_SHEET);

        let mut task_rows = Vec::with_capacity(tasks.len() + 1);
        task_rows.push(header_row(&TASK_HEADERS));
        task_rows.extend(tasks.iter().map(task_row));
        self.sheets.push(Sheet {
            name: TASK_SHEET.to_string(),
            rows: task_rows,
        });

        let mut subtask_rows = Vec::with_capacity(subtasks.len() + 1);
        subtask_rows.push(header_row(&SUBTASK_HEADERS));
        subtask_rows.extend(subtasks.iter().map(subtask_row));
        self.sheets.push(Sheet {
            name: SUBTASK_SHEET.to_string(),
            rows: subtask_rows,
        });
    }
}

/// Resolves where the workbook lives: `TASKSHEET_STORE_PATH`, then the
/// configured path, then the per-user default.
pub fn store_path(configured: Option<&Path>) -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    config::app_data_path(STORE_FILE_NAME)
}

/// Row store backed by a JSON workbook holding the "Main Tasks" and
/// "Subtasks" sheets.
#[derive(Debug, Clone)]
pub struct WorkbookStore {
    path: PathBuf,
}

impl WorkbookStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowStore for WorkbookStore {
    fn load(&self) -> Result<TaskState, AppError> {
        if !self.path.exists() {
            write_workbook(&self.path, &Workbook::with_task_sheets(&[], &[]))?;
            tracing::info!(path = %self.path.display(), "created empty workbook");
            return Ok(TaskState::default());
        }

        let workbook = read_workbook(&self.path)?;
        let tasks = decode_rows(workbook.sheet(TASK_SHEET)?, TASK_HEADERS.len(), task_from_row)?;
        let subtasks = decode_rows(
            workbook.sheet(SUBTASK_SHEET)?,
            SUBTASK_HEADERS.len(),
            subtask_from_row,
        )?;

        tracing::debug!(
            path = %self.path.display(),
            tasks = tasks.len(),
            subtasks = subtasks.len(),
            "loaded workbook"
        );
        Ok(TaskState { tasks, subtasks })
    }

    fn save(&self, tasks: &[Task], subtasks: &[Subtask]) -> Result<(), AppError> {
        let mut workbook = if self.path.exists() {
            read_workbook(&self.path)?
        } else {
            Workbook::default()
        };
        workbook.replace_task_sheets(tasks, subtasks);
        write_workbook(&self.path, &workbook)?;

        tracing::debug!(
            path = %self.path.display(),
            tasks = tasks.len(),
            subtasks = subtasks.len(),
            "saved workbook"
        );
        Ok(())
    }
}

fn read_workbook(path: &Path) -> Result<Workbook, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid workbook {}: {}", path.display(), err))
    })
}

fn write_workbook(path: &Path, workbook: &Workbook) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let content = serde_json::to_string_pretty(workbook)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    Ok(())
}

fn header_row(headers: &[&str]) -> Vec<Value> {
    headers.iter().map(|header| Value::from(*header)).collect()
}

fn task_row(task: &Task) -> Vec<Value> {
    vec![
        Value::from(task.id),
        Value::from(task.name.as_str()),
        Value::from(task.category.as_str()),
        Value::from(task.priority.as_str()),
        Value::from(task.start_date.as_str()),
        Value::from(task.due_date.as_str()),
        Value::from(task.status.as_str()),
        Value::from(task.progress.as_str()),
        Value::from(task.notes.as_str()),
    ]
}

fn subtask_row(subtask: &Subtask) -> Vec<Value> {
    vec![
        Value::from(subtask.id),
        Value::from(subtask.task_id),
        Value::from(subtask.name.as_str()),
        Value::from(subtask.status.as_str()),
        Value::from(subtask.progress.as_str()),
        Value::from(subtask.due_date.as_str()),
        Value::from(subtask.completed_date.as_str()),
    ]
}

fn decode_rows<T>(
    sheet: &Sheet,
    width: usize,
    decode: fn(&[Value]) -> Result<T, String>,
) -> Result<Vec<T>, AppError> {
    // Row 1 is the header.
    sheet
        .rows
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, row)| {
            let row_number = index + 1;
            if row.len() != width {
                return Err(AppError::invalid_data(format!(
                    "{}: row {} has {} cells, expected {}",
                    sheet.name,
                    row_number,
                    row.len(),
                    width
                )));
            }
            decode(row).map_err(|message| {
                AppError::invalid_data(format!("{}: row {}: {}", sheet.name, row_number, message))
            })
        })
        .collect()
}

fn task_from_row(row: &[Value]) -> Result<Task, String> {
    Ok(Task {
        id: id_cell(&row[0], TASK_HEADERS[0])?,
        name: text_cell(&row[1], TASK_HEADERS[1])?,
        category: text_cell(&row[2], TASK_HEADERS[2])?,
        priority: text_cell(&row[3], TASK_HEADERS[3])?,
        start_date: text_cell(&row[4], TASK_HEADERS[4])?,
        due_date: text_cell(&row[5], TASK_HEADERS[5])?,
        status: text_cell(&row[6], TASK_HEADERS[6])?,
        progress: text_cell(&row[7], TASK_HEADERS[7])?,
        notes: text_cell(&row[8], TASK_HEADERS[8])?,
    })
}

fn subtask_from_row(row: &[Value]) -> Result<Subtask, String> {
    Ok(Subtask {
        id: id_cell(&row[0], SUBTASK_HEADERS[0])?,
        task_id: id_cell(&row[1], SUBTASK_HEADERS[1])?,
        name: text_cell(&row[2], SUBTASK_HEADERS[2])?,
        status: text_cell(&row[3], SUBTASK_HEADERS[3])?,
        progress: text_cell(&row[4], SUBTASK_HEADERS[4])?,
        due_date: text_cell(&row[5], SUBTASK_HEADERS[5])?,
        completed_date: text_cell(&row[6], SUBTASK_HEADERS[6])?,
    })
}

fn id_cell(value: &Value, column: &str) -> Result<u64, String> {
    let id = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
                trimmed.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    };

    match id {
        Some(id) if id > 0 => Ok(id),
        _ => Err(format!("{column} must be a positive integer, got {value}")),
    }
}

fn text_cell(value: &Value, column: &str) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Array(_) | Value::Object(_) => Err(format!("{column} must be a single value")),
    }
}
