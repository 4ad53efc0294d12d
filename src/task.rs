//! Task records for the schedule outline.
//!
//! A task's position in the outline lives entirely in its hierarchy
//! number; `parent_id` is a derived convenience for the nested list view
//! and is reconciled from the numbers, never trusted for structure.
//! Predecessor references are stored by hierarchy number, not id, which
//! is why renumbering must be paired with predecessor remapping.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hierarchy::HierarchyNumber;

/// Stable opaque task identifier, assigned at creation and never reused.
pub type TaskId = Uuid;

/// A schedule task (one row of the Gantt outline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Absent only for tasks not yet positioned in the outline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<HierarchyNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    /// Hierarchy numbers of tasks that must finish before this one starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predecessors: Vec<HierarchyNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// Whole-day duration; derived for tasks with children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Percent complete, 0-100; duration-weighted for parents.
    #[serde(default)]
    pub progress: f64,
    /// Tie-break ordinal used only while `hierarchy` is absent.
    #[serde(default)]
    pub order_index: u32,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            hierarchy: None,
            parent_id: None,
            predecessors: Vec::new(),
            start: None,
            end: None,
            duration: None,
            progress: 0.0,
            order_index: 0,
        }
    }

    /// Place the task at an outline position.
    pub fn at(mut self, number: HierarchyNumber) -> Self {
        self.hierarchy = Some(number);
        self
    }

    pub fn with_predecessors(mut self, predecessors: Vec<HierarchyNumber>) -> Self {
        self.predecessors = predecessors;
        self
    }
}

/// Sort tasks into outline display order.
///
/// Numbered tasks come first in hierarchy order; unpositioned tasks sink
/// to the end ordered by `order_index`, then id for stability.
pub fn sort_outline(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| match (&left.hierarchy, &right.hierarchy) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => left
            .order_index
            .cmp(&right.order_index)
            .then_with(|| left.id.cmp(&right.id)),
    });
}

/// Look up a task by id.
pub fn find_task<'a>(tasks: &'a [Task], id: TaskId) -> Option<&'a Task> {
    tasks.iter().find(|task| task.id == id)
}

/// Look up the task occupying a hierarchy number.
pub fn task_at<'a>(tasks: &'a [Task], number: &HierarchyNumber) -> Option<&'a Task> {
    tasks
        .iter()
        .find(|task| task.hierarchy.as_ref() == Some(number))
}

/// Direct children of a number, sorted by sibling order.
pub fn children_of<'a>(tasks: &'a [Task], parent: &HierarchyNumber) -> Vec<&'a Task> {
    let mut children: Vec<&Task> = tasks
        .iter()
        .filter(|task| {
            task.hierarchy
                .as_ref()
                .and_then(|h| h.parent())
                .as_ref()
                == Some(parent)
        })
        .collect();
    children.sort_by_key(|task| task.hierarchy.as_ref().map(|h| h.last()));
    children
}

/// Root (depth-1) tasks, sorted by sibling order.
pub fn roots_of(tasks: &[Task]) -> Vec<&Task> {
    let mut roots: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.hierarchy.as_ref().is_some_and(|h| h.is_root()))
        .collect();
    roots.sort_by_key(|task| task.hierarchy.as_ref().map(|h| h.last()));
    roots
}

/// Every task strictly below `ancestor`.
pub fn descendants_of<'a>(tasks: &'a [Task], ancestor: &HierarchyNumber) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| {
            task.hierarchy
                .as_ref()
                .is_some_and(|h| h.is_descendant_of(ancestor))
        })
        .collect()
}

/// The sibling group containing `number` (including its own task),
/// sorted by sibling order.
pub fn siblings_of<'a>(tasks: &'a [Task], number: &HierarchyNumber) -> Vec<&'a Task> {
    let mut siblings: Vec<&Task> = tasks
        .iter()
        .filter(|task| {
            task.hierarchy
                .as_ref()
                .is_some_and(|h| h.is_sibling_of(number))
        })
        .collect();
    siblings.sort_by_key(|task| task.hierarchy.as_ref().map(|h| h.last()));
    siblings
}

/// A corrected `parent_id` for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentUpdate {
    pub id: TaskId,
    pub parent_id: Option<TaskId>,
}

/// Derive `parent_id` from hierarchy numbers and report mismatches.
///
/// The nested list view keeps its own parent pointers; after structural
/// operations they are re-derived from the numbers here.
pub fn reconcile_parents(tasks: &[Task]) -> Vec<ParentUpdate> {
    let mut updates = Vec::new();
    for task in tasks {
        let Some(number) = &task.hierarchy else {
            continue;
        };
        let expected = number
            .parent()
            .and_then(|parent| task_at(tasks, &parent))
            .map(|parent| parent.id);
        if expected != task.parent_id {
            updates.push(ParentUpdate {
                id: task.id,
                parent_id: expected,
            });
        }
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn sort_outline_orders_numbers_then_unpositioned() {
        let mut tasks = outline(&["2", "1.10", "1", "1.9"]);
        let mut floating = Task::new("floating");
        floating.order_index = 5;
        tasks.push(floating);

        sort_outline(&mut tasks);
        let numbers: Vec<String> = tasks
            .iter()
            .map(|t| {
                t.hierarchy
                    .as_ref()
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "-".to_string())
            })
            .collect();
        assert_eq!(numbers, vec!["1", "1.9", "1.10", "2", "-"]);
    }

    #[test]
    fn children_and_siblings_sort_numerically() {
        let tasks = outline(&["1", "1.1", "1.2", "1.10", "1.9", "2", "1.2.1"]);
        let children: Vec<String> = children_of(&tasks, &h("1"))
            .iter()
            .map(|t| t.hierarchy.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(children, vec!["1.1", "1.2", "1.9", "1.10"]);

        let siblings: Vec<String> = siblings_of(&tasks, &h("1.9"))
            .iter()
            .map(|t| t.hierarchy.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(siblings, vec!["1.1", "1.2", "1.9", "1.10"]);
    }

    #[test]
    fn descendants_cover_all_levels() {
        let tasks = outline(&["1", "1.2", "1.2.1", "2", "2.1"]);
        let found: Vec<String> = descendants_of(&tasks, &h("1"))
            .iter()
            .map(|t| t.hierarchy.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(found, vec!["1.2", "1.2.1"]);
    }

    #[test]
    fn reconcile_parents_repairs_stale_pointers() {
        let mut tasks = outline(&["1", "1.1", "2"]);
        let root_id = tasks[0].id;
        // child points at the wrong parent, root at a stale one
        tasks[1].parent_id = Some(tasks[2].id);
        tasks[0].parent_id = Some(tasks[2].id);

        let updates = reconcile_parents(&tasks);
        assert_eq!(updates.len(), 2);
        assert!(updates.contains(&ParentUpdate {
            id: tasks[0].id,
            parent_id: None
        }));
        assert!(updates.contains(&ParentUpdate {
            id: tasks[1].id,
            parent_id: Some(root_id)
        }));
    }
}
