//! End-to-end coordination of outline operations.
//!
//! One coordinator owns one project view: it reads the task set fresh at
//! the start of each operation, runs the renumbering and remapping
//! engines, applies an optimistic projection to its cache for instant UI
//! feedback, submits the batch to the task store as one logical unit,
//! and reverts the projection if the submission fails.
//!
//! Each operation moves through Idle -> Computing ->
//! OptimisticallyApplied -> Committed | RolledBack. Operations whose
//! footprints overlap an unsettled one are rejected, which serializes
//! edits per subtree.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::ProjectCache;
use crate::config::OutlineConfig;
use crate::error::{Error, Result};
use crate::events::{Event, EventKind, EventSink};
use crate::hierarchy::HierarchyNumber;
use crate::oplog::{OpLog, OpRecord, PriorNumber, PriorPredecessors, UndoData};
use crate::remap::{remap_predecessors, PredecessorUpdate};
use crate::renumber::{self, DropPosition, Reassignment, StructureOp};
use crate::rollup::{plan_rollup, ScheduleUpdate};
use crate::store::{BatchOptions, ChangeBatch, ProjectId, StoreError, TaskStore};
use crate::task::{reconcile_parents, Task, TaskId};

/// Why an operation was rejected. Rejections are no-ops, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Illegal(renumber::Illegal),
    /// Legal, but the outline is already in the requested shape.
    NoChange,
    /// An earlier operation touching the same tasks has not settled.
    SubtreeBusy,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Illegal(illegal) => illegal.fmt(f),
            RejectReason::NoChange => {
                f.write_str("the outline is already in the requested order")
            }
            RejectReason::SubtreeBusy => {
                f.write_str("another operation on the same tasks is still settling")
            }
        }
    }
}

/// Summary of a committed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOp {
    pub op_id: Uuid,
    pub renumbered: usize,
    pub remapped: usize,
}

/// Result of a command: committed or rejected without side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    Applied(AppliedOp),
    Rejected(RejectReason),
}

impl OpOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, OpOutcome::Applied(_))
    }
}

/// Per-operation lifecycle phase, reported in logs.
#[derive(Debug, Clone, Copy)]
enum OpPhase {
    Computing,
    OptimisticallyApplied,
    Committed,
    RolledBack,
}

impl OpPhase {
    fn as_str(self) -> &'static str {
        match self {
            OpPhase::Computing => "computing",
            OpPhase::OptimisticallyApplied => "optimistic",
            OpPhase::Committed => "committed",
            OpPhase::RolledBack => "rolled_back",
        }
    }
}

/// A direct edit to a task's schedule fields; `None` leaves a field as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleEdit {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub progress: Option<f64>,
}

/// Coordinates structural and schedule operations for one project.
pub struct Coordinator<S: TaskStore> {
    store: S,
    project: ProjectId,
    config: OutlineConfig,
    cache: ProjectCache,
    /// Ids whose writes are in flight; echoed changes for them are dropped.
    pending: HashSet<TaskId>,
    /// Footprints of unsettled operations.
    in_flight: Vec<HashSet<TaskId>>,
    oplog: OpLog,
    sink: Option<EventSink>,
    actor: Option<String>,
}

impl<S: TaskStore> Coordinator<S> {
    pub fn new(store: S, project: ProjectId) -> Self {
        Self {
            store,
            project,
            config: OutlineConfig::default(),
            cache: ProjectCache::new(),
            pending: HashSet::new(),
            in_flight: Vec::new(),
            oplog: OpLog::new(),
            sink: None,
            actor: None,
        }
    }

    pub fn with_config(mut self, config: OutlineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Re-read the authoritative task set into the cache.
    pub fn refresh(&mut self) -> Result<()> {
        let tasks = self.store.list_tasks(self.project).map_err(Error::Load)?;
        self.cache.replace(tasks);
        Ok(())
    }

    /// Outline-ordered view of the cached tasks.
    pub fn outline(&self) -> Vec<Task> {
        self.cache.outline()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.cache.get(id)
    }

    pub fn oplog(&self) -> &OpLog {
        &self.oplog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn sink_mut(&mut self) -> Option<&mut EventSink> {
        self.sink.as_mut()
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.pending.contains(&id)
    }

    // UI enablement predicates, evaluated against the cached view with
    // the same rules the mutating operations use.

    pub fn can_indent(&self, id: TaskId) -> bool {
        renumber::can_indent(id, self.cache.tasks())
    }

    pub fn can_outdent(&self, id: TaskId) -> bool {
        renumber::can_outdent(id, self.cache.tasks())
    }

    pub fn can_move_up(&self, id: TaskId) -> bool {
        renumber::can_move_up(id, self.cache.tasks())
    }

    pub fn can_move_down(&self, id: TaskId) -> bool {
        renumber::can_move_down(id, self.cache.tasks())
    }

    pub fn can_drop_at(&self, dragged: TaskId, target: TaskId) -> bool {
        renumber::can_drop_at(dragged, target, self.cache.tasks())
    }

    pub fn indent(&mut self, id: TaskId) -> Result<OpOutcome> {
        self.structural(StructureOp::Indent, id)
    }

    pub fn outdent(&mut self, id: TaskId) -> Result<OpOutcome> {
        self.structural(StructureOp::Outdent, id)
    }

    pub fn move_up(&mut self, id: TaskId) -> Result<OpOutcome> {
        self.structural(StructureOp::MoveUp, id)
    }

    pub fn move_down(&mut self, id: TaskId) -> Result<OpOutcome> {
        self.structural(StructureOp::MoveDown, id)
    }

    pub fn reposition(
        &mut self,
        id: TaskId,
        target: TaskId,
        position: DropPosition,
    ) -> Result<OpOutcome> {
        self.structural(StructureOp::Reposition { target, position }, id)
    }

    fn structural(&mut self, op: StructureOp, id: TaskId) -> Result<OpOutcome> {
        let action = op.action();
        debug!(
            action,
            task = %id,
            phase = OpPhase::Computing.as_str(),
            "starting outline operation"
        );
        self.refresh()?;

        let plan = renumber::plan(op, id, self.cache.tasks())?;
        if plan.is_empty() {
            // A legal drop next to the current neighbor yields an empty
            // plan; report that honestly instead of inventing a cause.
            let reason = match renumber::check(op, id, self.cache.tasks()) {
                Some(illegal) => RejectReason::Illegal(illegal),
                None => RejectReason::NoChange,
            };
            debug!(action, task = %id, %reason, "operation rejected");
            self.emit(
                EventKind::OperationRejected,
                json!({ "task": id, "action": action, "reason": reason.to_string() }),
            );
            return Ok(OpOutcome::Rejected(reason));
        }

        let remaps = if self.remaps(op) {
            remap_predecessors(&plan, self.cache.tasks())
        } else {
            Vec::new()
        };

        let footprint: HashSet<TaskId> = plan
            .iter()
            .map(|entry| entry.id)
            .chain(remaps.iter().map(|entry| entry.id))
            .chain([id])
            .collect();
        if self
            .in_flight
            .iter()
            .any(|settled| !settled.is_disjoint(&footprint))
        {
            return Ok(OpOutcome::Rejected(RejectReason::SubtreeBusy));
        }

        // Capture pre-operation state while the old numbers are in place.
        let snapshot = self.cache.snapshot();
        let undo = self.capture_undo(&plan, &remaps);
        let old_number = self.cache.get(id).and_then(|task| task.hierarchy.clone());
        let new_number = plan
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.number.clone());

        self.cache.apply_hierarchy(&plan);
        self.cache.apply_predecessors(&remaps);
        debug!(
            action,
            task = %id,
            phase = OpPhase::OptimisticallyApplied.as_str(),
            renumbered = plan.len(),
            remapped = remaps.len(),
            "projection applied"
        );

        let renumbered = plan.len();
        let remapped = remaps.len();
        let batch = ChangeBatch {
            hierarchy_updates: plan,
            predecessor_updates: remaps,
            ..ChangeBatch::default()
        };

        self.pending.extend(footprint.iter().copied());
        self.in_flight.push(footprint.clone());
        let submitted = self.submit(&batch);
        self.in_flight.pop();
        for task_id in &footprint {
            self.pending.remove(task_id);
        }

        match submitted {
            Ok(()) => {
                debug!(
                    action,
                    task = %id,
                    phase = OpPhase::Committed.as_str(),
                    "operation committed"
                );
                let parent_fixes = reconcile_parents(self.cache.tasks());
                self.cache.apply_parents(&parent_fixes);

                let mut record = OpRecord::new(action, id, self.actor.clone());
                record.undo_data = Some(undo);
                let op_id = record.op_id;
                self.oplog.append(record);

                let mut chain = Vec::new();
                if let Some(number) = old_number {
                    chain.push(number);
                }
                if let Some(number) = new_number {
                    chain.push(number);
                }
                self.rollup(&chain);

                self.emit(
                    event_kind_for(op),
                    json!({ "task": id, "renumbered": renumbered, "remapped": remapped }),
                );
                Ok(OpOutcome::Applied(AppliedOp {
                    op_id,
                    renumbered,
                    remapped,
                }))
            }
            Err(source) => {
                warn!(
                    action,
                    task = %id,
                    phase = OpPhase::RolledBack.as_str(),
                    error = %source,
                    "submission failed, reverting projection"
                );
                self.cache.restore(snapshot);
                // best-effort: prefer authoritative state over the snapshot
                if let Ok(fresh) = self.store.list_tasks(self.project) {
                    self.cache.replace(fresh);
                }
                self.emit(
                    EventKind::OperationFailed,
                    json!({ "task": id, "action": action, "error": source.to_string() }),
                );
                Err(Error::Submit { action, source })
            }
        }
    }

    /// Create a task at the next contiguous number under `parent` (or at
    /// the root) and persist it.
    pub fn insert(&mut self, name: &str, parent: Option<TaskId>) -> Result<Task> {
        self.refresh()?;
        let parent_number = match parent {
            Some(parent_id) => {
                let task = self
                    .cache
                    .get(parent_id)
                    .ok_or(Error::TaskNotFound(parent_id))?;
                Some(
                    task.hierarchy
                        .clone()
                        .ok_or(Error::Unpositioned(parent_id))?,
                )
            }
            None => None,
        };
        let number = renumber::next_child_number(self.cache.tasks(), parent_number.as_ref());
        let mut task = Task::new(name).at(number.clone());
        task.parent_id = parent;

        let snapshot = self.cache.snapshot();
        self.cache.insert(task.clone());
        let batch = ChangeBatch {
            inserts: vec![task.clone()],
            ..ChangeBatch::default()
        };
        self.pending.insert(task.id);
        let submitted = self.submit(&batch);
        self.pending.remove(&task.id);

        match submitted {
            Ok(()) => {
                self.oplog
                    .append(OpRecord::new("insert", task.id, self.actor.clone()));
                self.rollup(std::slice::from_ref(&number));
                self.emit(
                    EventKind::TaskInserted,
                    json!({ "task": task.id, "number": number.to_string() }),
                );
                Ok(task)
            }
            Err(source) => {
                self.cache.restore(snapshot);
                self.emit(
                    EventKind::OperationFailed,
                    json!({ "task": task.id, "action": "insert", "error": source.to_string() }),
                );
                Err(Error::Submit {
                    action: "insert",
                    source,
                })
            }
        }
    }

    /// Delete a task and its subtree, closing the sibling gap.
    ///
    /// Predecessor references to the removed numbers are deliberately
    /// left stale: rewriting shifted siblings here would retarget
    /// references to the deleted number onto whichever sibling inherits
    /// it.
    pub fn remove(&mut self, id: TaskId) -> Result<OpOutcome> {
        self.refresh()?;
        let removal = renumber::plan_remove(id, self.cache.tasks())?;
        let old_number = self.cache.get(id).and_then(|task| task.hierarchy.clone());

        let footprint: HashSet<TaskId> = removal
            .removed
            .iter()
            .copied()
            .chain(removal.reassignments.iter().map(|entry| entry.id))
            .collect();
        if self
            .in_flight
            .iter()
            .any(|settled| !settled.is_disjoint(&footprint))
        {
            return Ok(OpOutcome::Rejected(RejectReason::SubtreeBusy));
        }

        let snapshot = self.cache.snapshot();
        let removed_set: HashSet<TaskId> = removal.removed.iter().copied().collect();
        self.cache.remove(&removed_set);
        self.cache.apply_hierarchy(&removal.reassignments);

        let renumbered = removal.reassignments.len();
        let batch = ChangeBatch {
            hierarchy_updates: removal.reassignments,
            removals: removal.removed,
            ..ChangeBatch::default()
        };
        self.pending.extend(footprint.iter().copied());
        self.in_flight.push(footprint.clone());
        let submitted = self.submit(&batch);
        self.in_flight.pop();
        for task_id in &footprint {
            self.pending.remove(task_id);
        }

        match submitted {
            Ok(()) => {
                let parent_fixes = reconcile_parents(self.cache.tasks());
                self.cache.apply_parents(&parent_fixes);
                let record = OpRecord::new("remove", id, self.actor.clone());
                let op_id = record.op_id;
                self.oplog.append(record);
                if let Some(number) = old_number {
                    self.rollup(std::slice::from_ref(&number));
                }
                self.emit(
                    EventKind::TaskRemoved,
                    json!({ "task": id, "renumbered": renumbered }),
                );
                Ok(OpOutcome::Applied(AppliedOp {
                    op_id,
                    renumbered,
                    remapped: 0,
                }))
            }
            Err(source) => {
                self.cache.restore(snapshot);
                if let Ok(fresh) = self.store.list_tasks(self.project) {
                    self.cache.replace(fresh);
                }
                self.emit(
                    EventKind::OperationFailed,
                    json!({ "task": id, "action": "remove", "error": source.to_string() }),
                );
                Err(Error::Submit {
                    action: "remove",
                    source,
                })
            }
        }
    }

    /// Apply a direct edit to a task's dates/duration/progress and roll
    /// the change up the ancestor chain.
    pub fn set_schedule(&mut self, id: TaskId, edit: ScheduleEdit) -> Result<()> {
        self.refresh()?;
        let Some(task) = self.cache.get(id) else {
            return Err(Error::TaskNotFound(id));
        };
        let number = task.hierarchy.clone();
        let snapshot = self.cache.snapshot();

        let mut updated = task.clone();
        if let Some(start) = edit.start {
            updated.start = Some(start);
        }
        if let Some(end) = edit.end {
            updated.end = Some(end);
        }
        if let Some(duration) = edit.duration {
            updated.duration = Some(duration);
        }
        if let Some(progress) = edit.progress {
            updated.progress = progress.clamp(0.0, 100.0);
        }
        let update = ScheduleUpdate {
            id,
            start: updated.start,
            end: updated.end,
            duration: updated.duration,
            progress: updated.progress,
        };
        self.cache.apply_schedule(std::slice::from_ref(&update));

        self.pending.insert(id);
        let submitted = self.submit_schedule(std::slice::from_ref(&update));
        self.pending.remove(&id);

        match submitted {
            Ok(()) => {
                if let Some(number) = number {
                    self.rollup(std::slice::from_ref(&number));
                }
                self.emit(EventKind::ScheduleEdited, json!({ "task": id }));
                Ok(())
            }
            Err(source) => {
                self.cache.restore(snapshot);
                self.emit(
                    EventKind::OperationFailed,
                    json!({ "task": id, "action": "update", "error": source.to_string() }),
                );
                Err(Error::Submit {
                    action: "update",
                    source,
                })
            }
        }
    }

    /// Revert the most recent undoable operation by submitting its
    /// inverse batch.
    pub fn undo_last(&mut self) -> Result<Uuid> {
        let (log_index, record) = self
            .oplog
            .take_latest_undoable()
            .ok_or(Error::NothingToUndo)?;
        let Some(undo) = record.undo_data.clone() else {
            return Err(Error::NothingToUndo);
        };

        self.refresh()?;
        let batch = ChangeBatch {
            hierarchy_updates: undo
                .numbers
                .iter()
                .map(|prior| Reassignment {
                    id: prior.id,
                    number: prior.number.clone(),
                })
                .collect(),
            predecessor_updates: undo
                .predecessors
                .iter()
                .map(|prior| PredecessorUpdate {
                    id: prior.id,
                    predecessors: prior.predecessors.clone(),
                })
                .collect(),
            ..ChangeBatch::default()
        };

        let snapshot = self.cache.snapshot();
        self.cache.apply_hierarchy(&batch.hierarchy_updates);
        self.cache.apply_predecessors(&batch.predecessor_updates);

        let footprint: HashSet<TaskId> = batch.touched_ids().into_iter().collect();
        self.pending.extend(footprint.iter().copied());
        let submitted = self.submit(&batch);
        for task_id in &footprint {
            self.pending.remove(task_id);
        }

        match submitted {
            Ok(()) => {
                let parent_fixes = reconcile_parents(self.cache.tasks());
                self.cache.apply_parents(&parent_fixes);
                self.emit(
                    EventKind::UndoApplied,
                    json!({ "op": record.op_id, "action": record.action }),
                );
                Ok(record.op_id)
            }
            Err(source) => {
                self.cache.restore(snapshot);
                if let Ok(fresh) = self.store.list_tasks(self.project) {
                    self.cache.replace(fresh);
                }
                // keep the record, in place, so the undo can be retried
                self.oplog.restore(log_index, record);
                Err(Error::Submit {
                    action: "undo",
                    source,
                })
            }
        }
    }

    /// Apply a task arriving over the live-update channel. Changes for
    /// ids with an in-flight submission are dropped to break echo loops.
    pub fn absorb_external_change(&mut self, task: Task) -> bool {
        if self.pending.contains(&task.id) {
            debug!(task = %task.id, "ignoring echoed change for pending task");
            return false;
        }
        self.cache.upsert(task);
        true
    }

    fn remaps(&self, op: StructureOp) -> bool {
        match op {
            StructureOp::Indent => self.config.remap.on_indent,
            StructureOp::Outdent => self.config.remap.on_outdent,
            StructureOp::MoveUp | StructureOp::MoveDown | StructureOp::Reposition { .. } => {
                self.config.remap.on_reorder
            }
        }
    }

    fn capture_undo(&self, plan: &[Reassignment], remaps: &[PredecessorUpdate]) -> UndoData {
        let mut undo = UndoData::default();
        for entry in plan {
            if let Some(number) = self
                .cache
                .get(entry.id)
                .and_then(|task| task.hierarchy.clone())
            {
                undo.numbers.push(PriorNumber {
                    id: entry.id,
                    number,
                });
            }
        }
        for entry in remaps {
            if let Some(task) = self.cache.get(entry.id) {
                undo.predecessors.push(PriorPredecessors {
                    id: entry.id,
                    predecessors: task.predecessors.clone(),
                });
            }
        }
        undo
    }

    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            suppress_echo: self.config.submit.suppress_echo,
        }
    }

    fn submit(&mut self, batch: &ChangeBatch) -> std::result::Result<(), StoreError> {
        let opts = self.batch_options();
        match self.store.apply_batch(self.project, batch, opts) {
            Err(error) if error.is_transient() && self.config.submit.retry_transient => {
                debug!(error = %error, "transient store failure, retrying once");
                self.store.apply_batch(self.project, batch, opts)
            }
            result => result,
        }
    }

    fn submit_schedule(
        &mut self,
        updates: &[ScheduleUpdate],
    ) -> std::result::Result<(), StoreError> {
        let opts = self.batch_options();
        match self.store.apply_schedule(self.project, updates, opts) {
            Err(error) if error.is_transient() && self.config.submit.retry_transient => {
                debug!(error = %error, "transient store failure, retrying once");
                self.store.apply_schedule(self.project, updates, opts)
            }
            result => result,
        }
    }

    /// Recompute and persist ancestor roll-ups for the given numbers.
    ///
    /// The operation itself is already committed; a failed roll-up write
    /// is logged and the cache re-read, never surfaced as an operation
    /// failure.
    fn rollup(&mut self, numbers: &[HierarchyNumber]) {
        if !self.config.rollup.enabled {
            return;
        }
        let mut all: Vec<ScheduleUpdate> = Vec::new();
        for number in numbers {
            let updates = plan_rollup(number, self.cache.tasks());
            if updates.is_empty() {
                continue;
            }
            self.cache.apply_schedule(&updates);
            all.extend(updates);
        }
        if all.is_empty() {
            return;
        }
        if let Err(error) = self.submit_schedule(&all) {
            warn!(error = %error, "ancestor roll-up write failed");
            if let Ok(fresh) = self.store.list_tasks(self.project) {
                self.cache.replace(fresh);
            }
            return;
        }
        self.emit(EventKind::RollupApplied, json!({ "updated": all.len() }));
    }

    fn emit(&mut self, kind: EventKind, data: serde_json::Value) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let event = match Event::new(kind, self.actor.clone()).with_data(data) {
            Ok(event) => event,
            Err(error) => {
                warn!(error = %error, "failed to build event");
                return;
            }
        };
        if let Err(error) = sink.emit(&event) {
            warn!(error = %error, "failed to emit event");
        }
    }
}

fn event_kind_for(op: StructureOp) -> EventKind {
    match op {
        StructureOp::Indent => EventKind::TaskIndented,
        StructureOp::Outdent => EventKind::TaskOutdented,
        StructureOp::MoveUp => EventKind::TaskMovedUp,
        StructureOp::MoveDown => EventKind::TaskMovedDown,
        StructureOp::Reposition { .. } => EventKind::TaskRepositioned,
    }
}
