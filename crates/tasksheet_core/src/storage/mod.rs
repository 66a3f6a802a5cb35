use crate::error::AppError;
use crate::model::{Subtask, Task};

pub mod memory_store;
pub mod save_worker;
pub mod workbook_store;

pub use memory_store::MemoryStore;
pub use save_worker::SaveWorker;
pub use workbook_store::WorkbookStore;

/// Full snapshot of both tables, in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub subtasks: Vec<Subtask>,
}

/// Persistence contract for the two task tables.
///
/// Implementations never hold on to the collections they are given: `save`
/// receives the full lists and `load` hands back fresh ones.
pub trait RowStore: Send + Sync {
    /// Reads both tables, creating an empty store first when none exists.
    fn load(&self) -> Result<TaskState, AppError>;

    /// Replaces both tables with exactly the given rows.
    fn save(&self, tasks: &[Task], subtasks: &[Subtask]) -> Result<(), AppError>;
}
