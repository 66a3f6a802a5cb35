use super::{RowStore, TaskState};
use crate::error::AppError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Dedicated writer thread with a single pending slot.
///
/// `submit` parks a snapshot in the slot and returns immediately. A snapshot
/// that the writer has not picked up yet is replaced by the newer one, so the
/// writer only ever moves the file forward to the latest submitted state.
pub struct SaveWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    changed: Condvar,
}

#[derive(Default)]
struct Slot {
    pending: Option<TaskState>,
    writing: bool,
    closed: bool,
    first_error: Option<AppError>,
    superseded: usize,
}

impl SaveWorker {
    pub fn spawn(store: Arc<dyn RowStore>) -> Result<Self, AppError> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("tasksheet-save".to_string())
            .spawn(move || run(store.as_ref(), &worker_shared))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn submit(&self, state: TaskState) {
        let mut slot = self.shared.slot.lock();
        if slot.pending.replace(state).is_some() {
            slot.superseded += 1;
            tracing::debug!("replaced snapshot that was still waiting to be written");
        }
        self.shared.changed.notify_all();
    }

    /// Blocks until the slot is empty and no write is running, then returns
    /// the first failure recorded since the previous flush.
    pub fn flush(&self) -> Result<(), AppError> {
        let mut slot = self.shared.slot.lock();
        while slot.pending.is_some() || slot.writing {
            self.shared.changed.wait(&mut slot);
        }
        match slot.first_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// How many snapshots were dropped in favour of a newer one.
    pub fn superseded(&self) -> usize {
        self.shared.slot.lock().superseded
    }
}

fn run(store: &dyn RowStore, shared: &Shared) {
    loop {
        let state = {
            let mut slot = shared.slot.lock();
            loop {
                if let Some(state) = slot.pending.take() {
                    slot.writing = true;
                    break state;
                }
                if slot.closed {
                    return;
                }
                shared.changed.wait(&mut slot);
            }
        };

        let result = store.save(&state.tasks, &state.subtasks);

        let mut slot = shared.slot.lock();
        slot.writing = false;
        if let Err(err) = result {
            tracing::error!(error = %err, "background save failed");
            slot.first_error.get_or_insert(err);
        }
        shared.changed.notify_all();
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.closed = true;
            self.shared.changed.notify_all();
        }

        // The writer drains the slot before it notices `closed`.
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("save worker thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SaveWorker;
    use crate::model::Task;
    use crate::storage::{MemoryStore, RowStore, TaskState};
    use std::sync::Arc;

    fn state_with(names: &[&str]) -> TaskState {
        TaskState {
            tasks: names
                .iter()
                .enumerate()
                .map(|(index, name)| Task {
                    id: index as u64 + 1,
                    name: name.to_string(),
                    category: String::new(),
                    priority: String::new(),
                    start_date: String::new(),
                    due_date: String::new(),
                    status: String::new(),
                    progress: String::new(),
                    notes: String::new(),
                })
                .collect(),
            subtasks: Vec::new(),
        }
    }

    #[test]
    fn flush_leaves_latest_snapshot_in_store() {
        let store = Arc::new(MemoryStore::new());
        let worker = SaveWorker::spawn(store.clone() as Arc<dyn RowStore>).unwrap();

        worker.submit(state_with(&["a"]));
        worker.submit(state_with(&["a", "b"]));
        worker.submit(state_with(&["a", "b", "c"]));
        worker.flush().unwrap();

        assert_eq!(store.snapshot(), state_with(&["a", "b", "c"]));
        assert!(store.save_count() >= 1);
        assert_eq!(store.save_count() + worker.superseded(), 3);
    }

    #[test]
    fn flush_reports_failed_write_once() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_saves(1);
        let worker = SaveWorker::spawn(store.clone() as Arc<dyn RowStore>).unwrap();

        worker.submit(state_with(&["a"]));
        let err = worker.flush().unwrap_err();

        assert_eq!(err.code(), "io_error");
        assert!(worker.flush().is_ok());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn drop_writes_pending_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let worker = SaveWorker::spawn(store.clone() as Arc<dyn RowStore>).unwrap();

        worker.submit(state_with(&["a", "b"]));
        drop(worker);

        assert_eq!(store.snapshot(), state_with(&["a", "b"]));
    }
}
