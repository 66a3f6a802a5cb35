use super::TaskId;
use serde::{Deserialize, Serialize};

pub type SubtaskId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub task_id: TaskId,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub completed_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubtask {
    pub task_id: TaskId,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub completed_date: String,
}

impl NewSubtask {
    pub fn into_subtask(self, id: SubtaskId) -> Subtask {
        Subtask {
            id,
            task_id: self.task_id,
            name: self.name,
            status: self.status,
            progress: self.progress,
            due_date: self.due_date,
            completed_date: self.completed_date,
        }
    }
}
