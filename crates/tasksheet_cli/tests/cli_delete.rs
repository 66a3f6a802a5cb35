use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tasksheet"))
        .args(args)
        .env("TASKSHEET_STORE_PATH", store_path(dir))
        .env("TASKSHEET_CONFIG_PATH", dir.path().join("config.json"))
        .env_remove("TASKSHEET_LOG")
        .output()
        .expect("failed to run tasksheet")
}

fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("tasks.json")
}

fn write_store(dir: &TempDir, tasks: serde_json::Value, subtasks: serde_json::Value) {
    let mut task_rows = vec![serde_json::json!([
        "Task ID", "Task Name", "Category", "Priority", "Start Date", "Due Date", "Status",
        "Progress", "Notes"
    ])];
    task_rows.extend(tasks.as_array().unwrap().iter().cloned());
    let mut subtask_rows = vec![serde_json::json!([
        "Subtask ID", "Task ID", "Subtask Name", "Subtask Status", "Subtask Progress",
        "Subtask Due Date", "Subtask Completed Date"
    ])];
    subtask_rows.extend(subtasks.as_array().unwrap().iter().cloned());

    let content = serde_json::json!({
        "sheets": [
            { "name": "Main Tasks", "rows": task_rows },
            { "name": "Subtasks", "rows": subtask_rows }
        ]
    });
    std::fs::write(
        store_path(dir),
        serde_json::to_string_pretty(&content).unwrap(),
    )
    .unwrap();
}

fn read_rows(dir: &TempDir, sheet_name: &str) -> Vec<serde_json::Value> {
    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store_path(dir)).unwrap()).unwrap();
    stored["sheets"]
        .as_array()
        .unwrap()
        .iter()
        .find(|sheet| sheet["name"] == sheet_name)
        .map(|sheet| sheet["rows"].as_array().unwrap().iter().skip(1).cloned().collect())
        .unwrap()
}

#[test]
fn delete_command_cascades_to_subtasks() {
    let dir = tempfile::tempdir().unwrap();
    write_store(
        &dir,
        serde_json::json!([
            [1, "A", "", "", "", "", "", "", ""],
            [2, "B", "", "", "", "", "", "", ""]
        ]),
        serde_json::json!([
            [1, 1, "A1", "", "", "", ""],
            [2, 2, "B1", "", "", "", ""],
            [3, 1, "A2", "", "", "", ""]
        ]),
    );

    let output = run(&dir, &["delete", "1"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Deleted task: A (1) with 2 subtask(s)"));

    let tasks = read_rows(&dir, "Main Tasks");
    let subtasks = read_rows(&dir, "Subtasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0][1], "B");
    assert_eq!(subtasks.len(), 1);
    assert_eq!(subtasks[0][2], "B1");
}

#[test]
fn delete_command_with_unknown_id_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    write_store(
        &dir,
        serde_json::json!([[1, "A", "", "", "", "", "", "", ""]]),
        serde_json::json!([]),
    );

    let output = run(&dir, &["delete", "7"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("nothing deleted"));
    assert_eq!(read_rows(&dir, "Main Tasks").len(), 1);
}

#[test]
fn delete_command_json_reports_removed_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_store(
        &dir,
        serde_json::json!([[4, "A", "", "", "", "", "", "", ""]]),
        serde_json::json!([[1, 4, "A1", "", "", "", ""]]),
    );

    let output = run(&dir, &["delete", "4", "--json"]);

    assert!(output.status.success());
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["task"]["id"], 4);
    assert_eq!(payload["subtasks"][0]["name"], "A1");
}

#[test]
fn delete_command_reports_malformed_store() {
    let dir = tempfile::tempdir().unwrap();
    write_store(
        &dir,
        serde_json::json!([["x", "A", "", "", "", "", "", "", ""]]),
        serde_json::json!([]),
    );

    let output = run(&dir, &["delete", "1"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_data"));
}
