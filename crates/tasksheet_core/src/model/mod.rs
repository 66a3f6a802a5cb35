mod subtask;
mod task;

pub use subtask::{NewSubtask, Subtask, SubtaskId};
pub use task::{NewTask, Task, TaskId};
