//! Persistence seam between the outline engine and the hosted backend.
//!
//! The engine only ever reads a project's full task set and submits
//! atomic change batches; everything else about storage (query language,
//! auth, transport) lives behind `TaskStore`. `MemoryStore` is the
//! in-process implementation used by tests and by embedders without a
//! backend.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::remap::PredecessorUpdate;
use crate::renumber::Reassignment;
use crate::rollup::ScheduleUpdate;
use crate::task::{Task, TaskId};

/// Identifies one project's outline in the store.
pub type ProjectId = Uuid;

/// Failure reported by a task store.
///
/// `Transient` failures may succeed on an immediate retry; `StaleBase`
/// means the task set changed between read and submit and the caller
/// must refresh before retrying; `Fatal` is neither.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("task set changed since read: {0}")]
    StaleBase(String),

    #[error("store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// One logical unit of structural change, applied all-or-nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeBatch {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hierarchy_updates: Vec<Reassignment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub predecessor_updates: Vec<PredecessorUpdate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inserts: Vec<Task>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removals: Vec<TaskId>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.hierarchy_updates.is_empty()
            && self.predecessor_updates.is_empty()
            && self.inserts.is_empty()
            && self.removals.is_empty()
    }

    /// Every task id the batch touches.
    pub fn touched_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .hierarchy_updates
            .iter()
            .map(|entry| entry.id)
            .chain(self.predecessor_updates.iter().map(|entry| entry.id))
            .chain(self.inserts.iter().map(|task| task.id))
            .chain(self.removals.iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Submission options for a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Ask the store not to echo this write over the live channel.
    pub suppress_echo: bool,
}

/// Read/write contract with the hosted task backend.
///
/// `apply_batch` and `apply_schedule` must be atomic from the caller's
/// perspective; a partial apply makes the coordinator's rollback unsound.
pub trait TaskStore {
    /// The project's full outline, in arbitrary order.
    fn list_tasks(&self, project: ProjectId) -> Result<Vec<Task>, StoreError>;

    /// Apply one structural change batch.
    fn apply_batch(
        &mut self,
        project: ProjectId,
        batch: &ChangeBatch,
        opts: BatchOptions,
    ) -> Result<(), StoreError>;

    /// Apply recomputed schedule fields (direct edits and roll-ups).
    fn apply_schedule(
        &mut self,
        project: ProjectId,
        updates: &[ScheduleUpdate],
        opts: BatchOptions,
    ) -> Result<(), StoreError>;
}

/// In-memory task store with all-or-nothing batches.
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: HashMap<ProjectId, Vec<Task>>,
    fail_next: Option<StoreError>,
    batches_applied: usize,
    schedule_batches_applied: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project's outline.
    pub fn seed(&mut self, project: ProjectId, tasks: Vec<Task>) {
        self.projects.insert(project, tasks);
    }

    /// Make the next write fail with `error`, leaving state untouched.
    pub fn fail_next(&mut self, error: StoreError) {
        self.fail_next = Some(error);
    }

    /// Current tasks of a project (test inspection).
    pub fn tasks(&self, project: ProjectId) -> Vec<Task> {
        self.projects.get(&project).cloned().unwrap_or_default()
    }

    pub fn batches_applied(&self) -> usize {
        self.batches_applied
    }

    pub fn schedule_batches_applied(&self) -> usize {
        self.schedule_batches_applied
    }

    fn take_injected_failure(&mut self) -> Result<(), StoreError> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl TaskStore for MemoryStore {
    fn list_tasks(&self, project: ProjectId) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks(project))
    }

    fn apply_batch(
        &mut self,
        project: ProjectId,
        batch: &ChangeBatch,
        _opts: BatchOptions,
    ) -> Result<(), StoreError> {
        self.take_injected_failure()?;

        let tasks = self
            .projects
            .get(&project)
            .ok_or_else(|| StoreError::Fatal(format!("unknown project: {project}")))?;

        // Validate the whole batch before mutating anything.
        for entry in &batch.hierarchy_updates {
            if !tasks.iter().any(|task| task.id == entry.id) {
                return Err(StoreError::StaleBase(format!(
                    "hierarchy update for unknown task {}",
                    entry.id
                )));
            }
        }
        for entry in &batch.predecessor_updates {
            if !tasks.iter().any(|task| task.id == entry.id) {
                return Err(StoreError::StaleBase(format!(
                    "predecessor update for unknown task {}",
                    entry.id
                )));
            }
        }
        for id in &batch.removals {
            if !tasks.iter().any(|task| task.id == *id) {
                return Err(StoreError::StaleBase(format!(
                    "removal of unknown task {id}"
                )));
            }
        }

        let tasks = self
            .projects
            .get_mut(&project)
            .ok_or_else(|| StoreError::Fatal(format!("unknown project: {project}")))?;
        tasks.retain(|task| !batch.removals.contains(&task.id));
        for entry in &batch.hierarchy_updates {
            if let Some(task) = tasks.iter_mut().find(|task| task.id == entry.id) {
                task.hierarchy = Some(entry.number.clone());
            }
        }
        for entry in &batch.predecessor_updates {
            if let Some(task) = tasks.iter_mut().find(|task| task.id == entry.id) {
                task.predecessors = entry.predecessors.clone();
            }
        }
        tasks.extend(batch.inserts.iter().cloned());

        self.batches_applied += 1;
        Ok(())
    }

    fn apply_schedule(
        &mut self,
        project: ProjectId,
        updates: &[ScheduleUpdate],
        _opts: BatchOptions,
    ) -> Result<(), StoreError> {
        self.take_injected_failure()?;

        let tasks = self
            .projects
            .get_mut(&project)
            .ok_or_else(|| StoreError::Fatal(format!("unknown project: {project}")))?;
        for update in updates {
            let Some(task) = tasks.iter_mut().find(|task| task.id == update.id) else {
                return Err(StoreError::StaleBase(format!(
                    "schedule update for unknown task {}",
                    update.id
                )));
            };
            task.start = update.start;
            task.end = update.end;
            task.duration = update.duration;
            task.progress = update.progress;
        }

        self.schedule_batches_applied += 1;
        Ok(())
    }
}
