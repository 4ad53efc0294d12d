//! Predecessor remapping after renumbering.
//!
//! Predecessor references name hierarchy numbers, not ids, so every
//! renumbering that should preserve the dependency graph must rewrite the
//! references that named an old number. Which operations remap is a
//! product decision carried in `RemapConfig`: indent and outdent do,
//! reorder (move/drag) does not unless explicitly enabled.

use std::collections::HashMap;

use serde::Serialize;

use crate::hierarchy::HierarchyNumber;
use crate::renumber::Reassignment;
use crate::task::{Task, TaskId};

/// A rewritten predecessor list for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredecessorUpdate {
    pub id: TaskId,
    pub predecessors: Vec<HierarchyNumber>,
}

/// Rewrite predecessor references invalidated by a renumbering batch.
///
/// `tasks` still carries the old numbers. The output contains only tasks
/// whose list actually changed; references not named by the batch are
/// left untouched, including stale ones.
pub fn remap_predecessors(
    reassignments: &[Reassignment],
    tasks: &[Task],
) -> Vec<PredecessorUpdate> {
    if reassignments.is_empty() {
        return Vec::new();
    }

    // old number -> new number, for every task being renumbered
    let mut moved: HashMap<&HierarchyNumber, &HierarchyNumber> = HashMap::new();
    for entry in reassignments {
        let old = tasks
            .iter()
            .find(|task| task.id == entry.id)
            .and_then(|task| task.hierarchy.as_ref());
        if let Some(old) = old {
            moved.insert(old, &entry.number);
        }
    }

    let mut updates = Vec::new();
    for task in tasks {
        if task.predecessors.is_empty() {
            continue;
        }
        let mut changed = false;
        let rewritten: Vec<HierarchyNumber> = task
            .predecessors
            .iter()
            .map(|reference| match moved.get(reference) {
                Some(new) => {
                    changed = true;
                    (*new).clone()
                }
                None => reference.clone(),
            })
            .collect();
        if changed {
            updates.push(PredecessorUpdate {
                id: task.id,
                predecessors: rewritten,
            });
        }
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renumber::{plan, StructureOp};
    use crate::task::task_at;

    fn h(raw: &str) -> HierarchyNumber {
        raw.parse().unwrap()
    }

    fn outline(numbers: &[&str]) -> Vec<Task> {
        numbers
            .iter()
            .map(|raw| Task::new(format!("task {raw}")).at(h(raw)))
            .collect()
    }

    #[test]
    fn references_follow_the_renumbered_task() {
        // 3 depends on 1.2; outdenting 1.2 to 2 must retarget the reference.
        let mut tasks = outline(&["1", "1.1", "1.2", "2"]);
        let follower = tasks
            .iter()
            .position(|t| t.hierarchy == Some(h("2")))
            .unwrap();
        tasks[follower].predecessors = vec![h("1.2"), h("1.1")];
        let target = task_at(&tasks, &h("1.2")).unwrap().id;

        let batch = plan(StructureOp::Outdent, target, &tasks).unwrap();
        let updates = remap_predecessors(&batch, &tasks);

        // the follower itself was renumbered (2 -> 3) but its references
        // are rewritten against the old numbers
        let update = updates
            .iter()
            .find(|u| u.id == tasks[follower].id)
            .expect("follower rewritten");
        assert_eq!(update.predecessors, vec![h("2"), h("1.1")]);
    }

    #[test]
    fn untouched_and_stale_references_are_preserved() {
        let mut tasks = outline(&["1", "2", "3"]);
        // 3 depends on 1 (unaffected) and on a stale number 9
        tasks[2].predecessors = vec![h("1"), h("9")];
        let target = tasks[1].id;

        let batch = plan(StructureOp::Indent, target, &tasks).unwrap();
        let updates = remap_predecessors(&batch, &tasks);

        // neither reference named a renumbered task, so no update at all
        assert!(updates.iter().all(|u| u.id != tasks[2].id));
    }

    #[test]
    fn only_changed_lists_are_emitted() {
        let mut tasks = outline(&["1", "2", "3", "4"]);
        tasks[0].predecessors = vec![h("3")];
        tasks[3].predecessors = vec![h("1")];
        let target = tasks[2].id; // task "3"

        let batch = plan(StructureOp::Indent, target, &tasks).unwrap();
        let updates = remap_predecessors(&batch, &tasks);

        // indent 3 onto 2: 3 -> 2.1, 4 -> 3; only the reference to old 3
        // changes ("4"'s reference names 1, untouched)
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].id, tasks[0].id);
        assert_eq!(updates[0].predecessors, vec![h("2.1")]);
    }

    #[test]
    fn empty_batch_remaps_nothing() {
        let tasks = outline(&["1", "2"]);
        assert!(remap_predecessors(&[], &tasks).is_empty());
    }
}
