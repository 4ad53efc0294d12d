//! Project-scoped task cache backing the optimistic projection.
//!
//! The coordinator owns one cache per project view and is the only
//! writer. A snapshot taken before an operation makes the projection
//! fully revertible until the submission settles.

use std::collections::HashSet;

use crate::remap::PredecessorUpdate;
use crate::renumber::Reassignment;
use crate::rollup::ScheduleUpdate;
use crate::task::{sort_outline, ParentUpdate, Task, TaskId};

/// In-memory view of one project's outline.
#[derive(Debug, Default)]
pub struct ProjectCache {
    tasks: Vec<Task>,
}

impl ProjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached set with a freshly read one.
    pub fn replace(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Pre-operation copy for rollback and undo capture.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    /// Revert to a snapshot, discarding the optimistic projection.
    pub fn restore(&mut self, snapshot: Vec<Task>) {
        self.tasks = snapshot;
    }

    /// Outline-ordered view of the cached tasks.
    pub fn outline(&self) -> Vec<Task> {
        let mut view = self.tasks.clone();
        sort_outline(&mut view);
        view
    }

    pub fn apply_hierarchy(&mut self, reassignments: &[Reassignment]) {
        for entry in reassignments {
            if let Some(task) = self.tasks.iter_mut().find(|task| task.id == entry.id) {
                task.hierarchy = Some(entry.number.clone());
            }
        }
    }

    pub fn apply_predecessors(&mut self, updates: &[PredecessorUpdate]) {
        for entry in updates {
            if let Some(task) = self.tasks.iter_mut().find(|task| task.id == entry.id) {
                task.predecessors = entry.predecessors.clone();
            }
        }
    }

    pub fn apply_schedule(&mut self, updates: &[ScheduleUpdate]) {
        for entry in updates {
            if let Some(task) = self.tasks.iter_mut().find(|task| task.id == entry.id) {
                task.start = entry.start;
                task.end = entry.end;
                task.duration = entry.duration;
                task.progress = entry.progress;
            }
        }
    }

    pub fn apply_parents(&mut self, updates: &[ParentUpdate]) {
        for entry in updates {
            if let Some(task) = self.tasks.iter_mut().find(|task| task.id == entry.id) {
                task.parent_id = entry.parent_id;
            }
        }
    }

    pub fn insert(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn remove(&mut self, ids: &HashSet<TaskId>) {
        self.tasks.retain(|task| !ids.contains(&task.id));
    }

    /// Insert or overwrite a task arriving from the live-update channel.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }
}
