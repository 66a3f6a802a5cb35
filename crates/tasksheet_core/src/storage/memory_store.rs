use super::{RowStore, TaskState};
use crate::error::AppError;
use crate::model::{Subtask, Task};
use parking_lot::Mutex;

/// Row store that keeps the tables in process memory.
///
/// Useful for adapters that do not want a file and for observing how often
/// the repository writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: TaskState,
    saves: usize,
    failures_pending: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: TaskState) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                state,
                ..MemoryInner::default()
            }),
        }
    }

    /// Copy of what the last successful save stored.
    pub fn snapshot(&self) -> TaskState {
        self.inner.lock().state.clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }

    /// Makes the next `count` saves fail with an io error.
    pub fn fail_next_saves(&self, count: usize) {
        self.inner.lock().failures_pending = count;
    }
}

impl RowStore for MemoryStore {
    fn load(&self) -> Result<TaskState, AppError> {
        Ok(self.inner.lock().state.clone())
    }

    fn save(&self, tasks: &[Task], subtasks: &[Subtask]) -> Result<(), AppError> {
        let mut inner = self.inner.lock();
        if inner.failures_pending > 0 {
            inner.failures_pending -= 1;
            return Err(AppError::io("memory store refused the write"));
        }

        inner.state = TaskState {
            tasks: tasks.to_vec(),
            subtasks: subtasks.to_vec(),
        };
        inner.saves += 1;
        Ok(())
    }
}
