//! Renumbering plans for structural outline operations.
//!
//! Every operation reads the full task set and emits the complete set of
//! hierarchy-number reassignments needed to keep sibling runs contiguous:
//! the target, all of its descendants, and any siblings shifted to close
//! or open a gap. An empty plan means the operation is illegal in the
//! current outline (a rejected no-op, not an error); `Err` is reserved
//! for internal-consistency failures and always means no partial changes
//! were produced.
//!
//! The `can_*` predicates and `plan` share one legality check (`check`),
//! so UI enablement can never drift from what the mutation accepts.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::hierarchy::HierarchyNumber;
use crate::task::{children_of, descendants_of, find_task, roots_of, siblings_of, task_at};
use crate::task::{Task, TaskId};

/// Bound on the decrement search when closing a sibling gap. The search
/// terminates far earlier whenever the contiguity invariant holds.
const SLOT_SEARCH_LIMIT: u32 = 10_000;

/// Where a dragged task lands relative to the drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPosition {
    Before,
    After,
}

/// A user-initiated structural operation on one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureOp {
    /// Make the task a child of its immediately preceding sibling.
    Indent,
    /// Promote a depth-2 task to a root directly after its parent.
    Outdent,
    /// Swap the task with the sibling before it.
    MoveUp,
    /// Swap the task with the sibling after it.
    MoveDown,
    /// Drag the task next to another sibling.
    Reposition {
        target: TaskId,
        position: DropPosition,
    },
}

impl StructureOp {
    /// Verb used in log lines, events, and failure messages.
    pub fn action(&self) -> &'static str {
        match self {
            StructureOp::Indent => "indent",
            StructureOp::Outdent => "outdent",
            StructureOp::MoveUp => "move up",
            StructureOp::MoveDown => "move down",
            StructureOp::Reposition { .. } => "reposition",
        }
    }
}

/// Why an operation is illegal in the current outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Illegal {
    UnknownTask,
    Unpositioned,
    NoPrecedingSibling,
    ChildSlotTaken,
    OutdentDepth,
    NoSiblingAbove,
    NoSiblingBelow,
    DropOnSelf,
    DropOnDescendant,
    DropOutsideSiblingGroup,
}

impl fmt::Display for Illegal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Illegal::UnknownTask => "task does not exist",
            Illegal::Unpositioned => "task has no outline position",
            Illegal::NoPrecedingSibling => "no preceding sibling to indent under",
            Illegal::ChildSlotTaken => "the next child slot is already occupied",
            Illegal::OutdentDepth => "only second-level tasks can be outdented",
            Illegal::NoSiblingAbove => "already the first sibling",
            Illegal::NoSiblingBelow => "already the last sibling",
            Illegal::DropOnSelf => "cannot drop a task onto itself",
            Illegal::DropOnDescendant => "cannot drop a task onto its own descendant",
            Illegal::DropOutsideSiblingGroup => "drop target is not a sibling",
        };
        f.write_str(text)
    }
}

/// A single hierarchy-number reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reassignment {
    pub id: TaskId,
    pub number: HierarchyNumber,
}

/// Check whether `op` is legal for `id` without computing the plan.
pub fn check(op: StructureOp, id: TaskId, tasks: &[Task]) -> Option<Illegal> {
    let Some(task) = find_task(tasks, id) else {
        return Some(Illegal::UnknownTask);
    };
    let Some(number) = &task.hierarchy else {
        return Some(Illegal::Unpositioned);
    };

    match op {
        StructureOp::Indent => {
            if number.last() <= 1 {
                return Some(Illegal::NoPrecedingSibling);
            }
            let preceding = number.with_last(number.last() - 1);
            if task_at(tasks, &preceding).is_none() {
                return Some(Illegal::NoPrecedingSibling);
            }
            let slot = preceding.child(children_of(tasks, &preceding).len() as u32 + 1);
            if task_at(tasks, &slot).is_some() {
                return Some(Illegal::ChildSlotTaken);
            }
            None
        }
        StructureOp::Outdent => {
            if number.depth() != 2 {
                Some(Illegal::OutdentDepth)
            } else {
                None
            }
        }
        StructureOp::MoveUp => {
            if number.last() <= 1 || task_at(tasks, &number.with_last(number.last() - 1)).is_none()
            {
                Some(Illegal::NoSiblingAbove)
            } else {
                None
            }
        }
        StructureOp::MoveDown => {
            if task_at(tasks, &number.with_last(number.last() + 1)).is_none() {
                Some(Illegal::NoSiblingBelow)
            } else {
                None
            }
        }
        StructureOp::Reposition { target, .. } => {
            if target == id {
                return Some(Illegal::DropOnSelf);
            }
            let Some(target_task) = find_task(tasks, target) else {
                return Some(Illegal::UnknownTask);
            };
            let Some(target_number) = &target_task.hierarchy else {
                return Some(Illegal::Unpositioned);
            };
            if target_number.is_descendant_of(number) {
                return Some(Illegal::DropOnDescendant);
            }
            if !target_number.is_sibling_of(number) {
                return Some(Illegal::DropOutsideSiblingGroup);
            }
            None
        }
    }
}

/// Compute the full reassignment batch for `op` on `id`.
///
/// Illegal operations return an empty plan. A returned plan is verified
/// collision-free against itself and all untouched tasks.
pub fn plan(op: StructureOp, id: TaskId, tasks: &[Task]) -> Result<Vec<Reassignment>> {
    if check(op, id, tasks).is_some() {
        return Ok(Vec::new());
    }
    let Some(task) = find_task(tasks, id) else {
        return Ok(Vec::new());
    };
    let Some(number) = task.hierarchy.clone() else {
        return Ok(Vec::new());
    };

    let plan = match op {
        StructureOp::Indent => plan_indent(task, &number, tasks)?,
        StructureOp::Outdent => plan_outdent(task, &number, tasks),
        StructureOp::MoveUp => plan_move(task, &number, tasks, true),
        StructureOp::MoveDown => plan_move(task, &number, tasks, false),
        StructureOp::Reposition { target, position } => {
            plan_reposition(task, &number, target, position, tasks)
        }
    };

    verify(&plan, tasks, &HashSet::new())?;
    Ok(plan)
}

pub fn can_indent(id: TaskId, tasks: &[Task]) -> bool {
    check(StructureOp::Indent, id, tasks).is_none()
}

pub fn can_outdent(id: TaskId, tasks: &[Task]) -> bool {
    check(StructureOp::Outdent, id, tasks).is_none()
}

pub fn can_move_up(id: TaskId, tasks: &[Task]) -> bool {
    check(StructureOp::MoveUp, id, tasks).is_none()
}

pub fn can_move_down(id: TaskId, tasks: &[Task]) -> bool {
    check(StructureOp::MoveDown, id, tasks).is_none()
}

/// Whether `dragged` may be dropped next to `target`. Position does not
/// affect legality.
pub fn can_drop_at(dragged: TaskId, target: TaskId, tasks: &[Task]) -> bool {
    check(
        StructureOp::Reposition {
            target,
            position: DropPosition::After,
        },
        dragged,
        tasks,
    )
    .is_none()
}

/// The contiguous number for a task inserted under `parent` (or at the
/// root when `parent` is `None`).
pub fn next_child_number(tasks: &[Task], parent: Option<&HierarchyNumber>) -> HierarchyNumber {
    match parent {
        Some(parent) => {
            let next = children_of(tasks, parent)
                .iter()
                .filter_map(|t| t.hierarchy.as_ref().map(|h| h.last()))
                .max()
                .unwrap_or(0)
                + 1;
            parent.child(next)
        }
        None => {
            let next = roots_of(tasks)
                .iter()
                .filter_map(|t| t.hierarchy.as_ref().map(|h| h.last()))
                .max()
                .unwrap_or(0)
                + 1;
            HierarchyNumber::root(next)
        }
    }
}

/// Deleting a task removes its subtree and closes the sibling gap.
#[derive(Debug, Clone)]
pub struct RemovalPlan {
    pub removed: Vec<TaskId>,
    pub reassignments: Vec<Reassignment>,
}

/// Compute the removal of `id` and its descendants.
pub fn plan_remove(id: TaskId, tasks: &[Task]) -> Result<RemovalPlan> {
    let task = find_task(tasks, id).ok_or(Error::TaskNotFound(id))?;
    let Some(number) = task.hierarchy.clone() else {
        return Ok(RemovalPlan {
            removed: vec![id],
            reassignments: Vec::new(),
        });
    };

    let mut removed = vec![id];
    removed.extend(descendants_of(tasks, &number).iter().map(|t| t.id));

    let mut reassignments = Vec::new();
    for sibling in later_siblings(tasks, &number) {
        if let Some(old) = sibling.hierarchy.clone() {
            push_subtree(
                &mut reassignments,
                tasks,
                &old,
                &old.with_last(old.last() - 1),
                sibling.id,
            );
        }
    }

    let removed_set: HashSet<TaskId> = removed.iter().copied().collect();
    verify(&reassignments, tasks, &removed_set)?;
    Ok(RemovalPlan {
        removed,
        reassignments,
    })
}

/// Siblings of `number` with a greater sibling-order segment, ascending.
fn later_siblings<'a>(tasks: &'a [Task], number: &HierarchyNumber) -> Vec<&'a Task> {
    siblings_of(tasks, number)
        .into_iter()
        .filter(|s| {
            s.hierarchy
                .as_ref()
                .is_some_and(|h| h.last() > number.last())
        })
        .collect()
}

/// Reassign one task and every descendant under its old number.
fn push_subtree(
    plan: &mut Vec<Reassignment>,
    tasks: &[Task],
    old: &HierarchyNumber,
    new: &HierarchyNumber,
    id: TaskId,
) {
    plan.push(Reassignment {
        id,
        number: new.clone(),
    });
    for descendant in descendants_of(tasks, old) {
        if let Some(h) = &descendant.hierarchy {
            plan.push(Reassignment {
                id: descendant.id,
                number: h.reprefixed(old, new),
            });
        }
    }
}

fn plan_indent(task: &Task, number: &HierarchyNumber, tasks: &[Task]) -> Result<Vec<Reassignment>> {
    let preceding = number.with_last(number.last() - 1);
    let child_slot = preceding.child(children_of(tasks, &preceding).len() as u32 + 1);

    let mut plan = Vec::new();
    push_subtree(&mut plan, tasks, number, &child_slot, task.id);

    // Close the gap the task left in its old sibling group. A candidate
    // already assigned in this batch keeps decrementing until free.
    let mut assigned: HashSet<HierarchyNumber> =
        plan.iter().map(|entry| entry.number.clone()).collect();
    for sibling in later_siblings(tasks, number) {
        let Some(old) = sibling.hierarchy.clone() else {
            continue;
        };
        let mut candidate = old.with_last(old.last() - 1);
        let mut steps = 0;
        while assigned.contains(&candidate) {
            if candidate.last() <= 1 || steps >= SLOT_SEARCH_LIMIT {
                return Err(Error::Consistency(format!(
                    "no free slot while closing the gap at {old}"
                )));
            }
            candidate = candidate.with_last(candidate.last() - 1);
            steps += 1;
        }
        let before = plan.len();
        push_subtree(&mut plan, tasks, &old, &candidate, sibling.id);
        for entry in &plan[before..] {
            assigned.insert(entry.number.clone());
        }
    }
    Ok(plan)
}

fn plan_outdent(task: &Task, number: &HierarchyNumber, tasks: &[Task]) -> Vec<Reassignment> {
    // check() guarantees depth 2, so the parent is a root number.
    let Some(parent) = number.parent() else {
        return Vec::new();
    };
    let parent_slot = parent.last();
    let new_root = HierarchyNumber::root(parent_slot + 1);

    let mut plan = Vec::new();

    // Roots after the former parent shift up to make room.
    for root in roots_of(tasks) {
        let Some(old) = root.hierarchy.clone() else {
            continue;
        };
        if old.last() > parent_slot {
            push_subtree(&mut plan, tasks, &old, &old.with_last(old.last() + 1), root.id);
        }
    }

    // The promoted task and its subtree take the opened slot.
    push_subtree(&mut plan, tasks, number, &new_root, task.id);

    // Later children of the former parent close the gap.
    for sibling in later_siblings(tasks, number) {
        if let Some(old) = sibling.hierarchy.clone() {
            push_subtree(
                &mut plan,
                tasks,
                &old,
                &old.with_last(old.last() - 1),
                sibling.id,
            );
        }
    }
    plan
}

fn plan_move(task: &Task, number: &HierarchyNumber, tasks: &[Task], up: bool) -> Vec<Reassignment> {
    let adjacent_slot = if up {
        number.last() - 1
    } else {
        number.last() + 1
    };
    let adjacent_number = number.with_last(adjacent_slot);
    let Some(adjacent) = task_at(tasks, &adjacent_number) else {
        return Vec::new();
    };

    let mut plan = Vec::new();
    push_subtree(&mut plan, tasks, number, &adjacent_number, task.id);
    push_subtree(&mut plan, tasks, &adjacent_number, number, adjacent.id);
    plan
}

fn plan_reposition(
    task: &Task,
    number: &HierarchyNumber,
    target: TaskId,
    position: DropPosition,
    tasks: &[Task],
) -> Vec<Reassignment> {
    let mut ordered = siblings_of(tasks, number);
    ordered.retain(|sibling| sibling.id != task.id);
    let Some(index) = ordered.iter().position(|sibling| sibling.id == target) else {
        return Vec::new();
    };
    let insert_at = match position {
        DropPosition::Before => index,
        DropPosition::After => index + 1,
    };
    ordered.insert(insert_at, task);

    // Renumber the whole sibling sequence 1..N; untouched positions are
    // skipped so the plan stays minimal.
    let mut plan = Vec::new();
    for (i, sibling) in ordered.iter().enumerate() {
        let Some(old) = sibling.hierarchy.clone() else {
            continue;
        };
        let slot = (i + 1) as u32;
        if old.last() != slot {
            push_subtree(&mut plan, tasks, &old, &old.with_last(slot), sibling.id);
        }
    }
    plan
}

/// Abort rather than emit a batch that assigns one number twice or lands
/// on a task the batch does not move.
fn verify(plan: &[Reassignment], tasks: &[Task], removed: &HashSet<TaskId>) -> Result<()> {
    if plan.is_empty() {
        return Ok(());
    }

    let mut seen: HashMap<&HierarchyNumber, TaskId> = HashMap::new();
    for entry in plan {
        if let Some(previous) = seen.insert(&entry.number, entry.id) {
            if previous != entry.id {
                return Err(Error::Consistency(format!(
                    "number {} assigned to two tasks",
                    entry.number
                )));
            }
        }
    }

    let moved: HashSet<TaskId> = plan.iter().map(|entry| entry.id).collect();
    for task in tasks {
        if moved.contains(&task.id) || removed.contains(&task.id) {
            continue;
        }
        if let Some(number) = &task.hierarchy {
            if seen.contains_key(number) {
                return Err(Error::Consistency(format!(
                    "reassigned number {number} collides with an unmoved task"
                )));
            }
        }
    }
    Ok(())
}
