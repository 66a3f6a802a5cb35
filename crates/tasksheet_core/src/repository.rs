use crate::error::AppError;
use crate::model::{NewSubtask, NewTask, Subtask, SubtaskId, Task, TaskId};
use crate::storage::{RowStore, SaveWorker, TaskState};
use std::sync::Arc;

/// How `persist` reaches the row store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveMode {
    /// Write inline; the mutating call reports write failures.
    Blocking,
    /// Hand snapshots to the writer thread; failures surface on `flush`.
    #[default]
    Background,
}

impl SaveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Background => "background",
        }
    }
}

enum Persistence {
    Blocking(Arc<dyn RowStore>),
    Background(SaveWorker),
}

/// What `delete_task` took out of the lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRemoval {
    pub task: Option<Task>,
    pub subtasks: Vec<Subtask>,
}

/// Owns the authoritative task and subtask lists for a session.
///
/// Every mutation updates the lists first and then persists the full
/// snapshot exactly once. A failed write is not rolled back, so after a
/// storage error the lists may be ahead of the file.
pub struct TaskRepository {
    tasks: Vec<Task>,
    subtasks: Vec<Subtask>,
    task_high_water: TaskId,
    subtask_high_water: SubtaskId,
    mode: SaveMode,
    persistence: Persistence,
}

impl TaskRepository {
    pub fn load(store: Arc<dyn RowStore>, mode: SaveMode) -> Result<Self, AppError> {
        let state = store.load()?;
        let persistence = match mode {
            SaveMode::Blocking => Persistence::Blocking(store),
            SaveMode::Background => Persistence::Background(SaveWorker::spawn(store)?),
        };

        tracing::info!(
            tasks = state.tasks.len(),
            subtasks = state.subtasks.len(),
            mode = mode.as_str(),
            "loaded task repository"
        );

        Ok(Self {
            task_high_water: max_id(state.tasks.iter().map(|task| task.id)),
            subtask_high_water: max_id(state.subtasks.iter().map(|subtask| subtask.id)),
            tasks: state.tasks,
            subtasks: state.subtasks,
            mode,
            persistence,
        })
    }

    pub fn save_mode(&self) -> SaveMode {
        self.mode
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn subtasks_for(&self, task_id: TaskId) -> impl Iterator<Item = &Subtask> + '_ {
        self.subtasks
            .iter()
            .filter(move |subtask| subtask.task_id == task_id)
    }

    pub fn add_task(&mut self, fields: NewTask) -> Result<Task, AppError> {
        require_text(&fields.name, "task name")?;

        let id = self.next_task_id()?;
        let task = fields.into_task(id);
        self.tasks.push(task.clone());
        tracing::debug!(task_id = id, "added task");

        self.persist()?;
        Ok(task)
    }

    pub fn add_subtask(&mut self, fields: NewSubtask) -> Result<Subtask, AppError> {
        require_text(&fields.name, "subtask name")?;
        if self.task(fields.task_id).is_none() {
            tracing::debug!(task_id = fields.task_id, "rejected subtask for unknown task");
            return Err(AppError::task_not_found(fields.task_id));
        }

        let id = self.next_subtask_id()?;
        let subtask = fields.into_subtask(id);
        self.subtasks.push(subtask.clone());
        tracing::debug!(subtask_id = id, task_id = subtask.task_id, "added subtask");

        self.persist()?;
        Ok(subtask)
    }

    /// Removes the task and every subtask pointing at it. Unknown ids are not
    /// an error; the snapshot is still written.
    pub fn delete_task(&mut self, task_id: TaskId) -> Result<TaskRemoval, AppError> {
        let task = self
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .map(|index| self.tasks.remove(index));

        let (removed, kept): (Vec<Subtask>, Vec<Subtask>) = std::mem::take(&mut self.subtasks)
            .into_iter()
            .partition(|subtask| subtask.task_id == task_id);
        self.subtasks = kept;

        tracing::debug!(
            task_id,
            found = task.is_some(),
            cascaded = removed.len(),
            "deleted task"
        );

        self.persist()?;
        Ok(TaskRemoval {
            task,
            subtasks: removed,
        })
    }

    pub fn delete_subtask(&mut self, subtask_id: SubtaskId) -> Result<Option<Subtask>, AppError> {
        let removed = self
            .subtasks
            .iter()
            .position(|subtask| subtask.id == subtask_id)
            .map(|index| self.subtasks.remove(index));
        tracing::debug!(subtask_id, found = removed.is_some(), "deleted subtask");

        self.persist()?;
        Ok(removed)
    }

    /// Writes the current lists. In background mode this only queues the
    /// snapshot.
    pub fn persist(&self) -> Result<(), AppError> {
        match &self.persistence {
            Persistence::Blocking(store) => {
                store.save(&self.tasks, &self.subtasks).inspect_err(|err| {
                    tracing::warn!(error = %err, "save failed, in-memory lists differ from the store");
                })
            }
            Persistence::Background(worker) => {
                worker.submit(TaskState {
                    tasks: self.tasks.clone(),
                    subtasks: self.subtasks.clone(),
                });
                Ok(())
            }
        }
    }

    /// Waits for queued writes and reports the first one that failed.
    pub fn flush(&self) -> Result<(), AppError> {
        match &self.persistence {
            Persistence::Blocking(_) => Ok(()),
            Persistence::Background(worker) => worker.flush(),
        }
    }

    fn next_task_id(&mut self) -> Result<TaskId, AppError> {
        let id = next_id(self.tasks.iter().map(|task| task.id), self.task_high_water)
            .ok_or_else(|| AppError::invalid_data("task id space exhausted"))?;
        self.task_high_water = id;
        Ok(id)
    }

    fn next_subtask_id(&mut self) -> Result<SubtaskId, AppError> {
        let id = next_id(
            self.subtasks.iter().map(|subtask| subtask.id),
            self.subtask_high_water,
        )
        .ok_or_else(|| AppError::invalid_data("subtask id space exhausted"))?;
        self.subtask_high_water = id;
        Ok(id)
    }
}

/// One past the larger of the highest live id and the session high-water
/// mark; `None` once `u64::MAX` is taken.
fn next_id(ids: impl Iterator<Item = u64>, high_water: u64) -> Option<u64> {
    max_id(ids).max(high_water).checked_add(1)
}

fn max_id(ids: impl Iterator<Item = u64>) -> u64 {
    ids.max().unwrap_or(0)
}

fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_input(format!("{field} is required")));
    }
    Ok(())
}
