use crate::client::store::TaskStore;
use crate::models::{Task, TaskPriority, TaskStatus};

/// The dashboard's two groups: incomplete first, complete second. Both keep
/// the relative order of the source collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBoard {
    pub pending: Vec<Task>,
    pub completed: Vec<Task>,
}

/// Splits a task sequence into pending/completed groups in one pass. Every
/// input task lands in exactly one group.
pub fn partition(tasks: &[Task]) -> TaskBoard {
    let mut board = TaskBoard::default();
    for task in tasks {
        match task.status {
            TaskStatus::Pending => board.pending.push(task.clone()),
            TaskStatus::Completed => board.completed.push(task.clone()),
        }
    }
    board
}

/// Stable priority ordering: high, then medium, then low.
pub fn sorted_by_priority(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by_key(|t| priority_rank(t.priority));
    sorted
}

fn priority_rank(priority: TaskPriority) -> u8 {
    match priority {
        TaskPriority::High => 0,
        TaskPriority::Medium => 1,
        TaskPriority::Low => 2,
    }
}

/// Derives the board from a store, recomputing only when the store's
/// revision has moved since the last call.
#[derive(Default)]
pub struct ViewComposer {
    cached_revision: Option<u64>,
    board: TaskBoard,
}

impl ViewComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compose(&mut self, store: &TaskStore) -> &TaskBoard {
        let (revision, tasks) = store.snapshot();
        if self.cached_revision != Some(revision) {
            self.board = partition(&tasks);
            self.cached_revision = Some(revision);
        }
        &self.board
    }
}
