//! Ancestor schedule roll-up.
//!
//! A parent task's dates, duration, and progress are derived from its
//! children: earliest start, latest end, inclusive whole-day span, and
//! duration-weighted progress. After any change to a task the ancestor
//! chain is recomputed nearest first, and only ancestors whose stored
//! values differ are emitted, so echoed writes converge instead of
//! looping.

use chrono::NaiveDate;
use serde::Serialize;

use crate::hierarchy::HierarchyNumber;
use crate::task::{children_of, Task, TaskId};

/// Tolerance for progress comparison; below this the stored value wins.
const PROGRESS_TOLERANCE: f64 = 1e-6;

/// Recomputed schedule fields for one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleUpdate {
    pub id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Rolled {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    duration: Option<i64>,
    progress: f64,
}

/// Walk the ancestor chain of `changed` (nearest first) and emit an
/// update for every ancestor whose derived fields differ.
///
/// Later (higher) ancestors see the recomputed values of nearer ones.
pub fn plan_rollup(changed: &HierarchyNumber, tasks: &[Task]) -> Vec<ScheduleUpdate> {
    let mut working: Vec<Task> = tasks.to_vec();
    let mut updates = Vec::new();

    for ancestor in changed.ancestors() {
        let Some(index) = working
            .iter()
            .position(|task| task.hierarchy.as_ref() == Some(&ancestor))
        else {
            continue;
        };
        let children = children_of(&working, &ancestor);
        if children.is_empty() {
            continue;
        }
        let rolled = roll_children(&children);
        let current = &working[index];
        if !differs(current, &rolled) {
            continue;
        }

        let task = &mut working[index];
        task.start = rolled.start;
        task.end = rolled.end;
        task.duration = rolled.duration;
        task.progress = rolled.progress;
        updates.push(ScheduleUpdate {
            id: task.id,
            start: rolled.start,
            end: rolled.end,
            duration: rolled.duration,
            progress: rolled.progress,
        });
    }
    updates
}

fn roll_children(children: &[&Task]) -> Rolled {
    let start = children.iter().filter_map(|child| child.start).min();
    let end = children.iter().filter_map(|child| child.end).max();
    // Inclusive whole-day span: a task starting and ending the same day
    // has duration 1.
    let duration = match (start, end) {
        (Some(start), Some(end)) if end >= start => {
            Some((end - start).num_days() + 1)
        }
        _ => None,
    };

    let total_weight: f64 = children
        .iter()
        .map(|child| child.duration.unwrap_or(0).max(0) as f64)
        .sum();
    let progress = if total_weight > 0.0 {
        children
            .iter()
            .map(|child| child.progress * child.duration.unwrap_or(0).max(0) as f64)
            .sum::<f64>()
            / total_weight
    } else {
        children.iter().map(|child| child.progress).sum::<f64>() / children.len() as f64
    };

    Rolled {
        start,
        end,
        duration,
        progress,
    }
}

fn differs(current: &Task, rolled: &Rolled) -> bool {
    current.start != rolled.start
        || current.end != rolled.end
        || current.duration != rolled.duration
        || (current.progress - rolled.progress).abs() > PROGRESS_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(raw: &str) -> HierarchyNumber {
        raw.parse().unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        raw.parse().unwrap()
    }

    fn task(number: &str) -> Task {
        Task::new(format!("task {number}")).at(h(number))
    }

    fn scheduled(number: &str, start: &str, end: &str, progress: f64) -> Task {
        let mut t = task(number);
        t.start = Some(date(start));
        t.end = Some(date(end));
        t.duration = Some((date(end) - date(start)).num_days() + 1);
        t.progress = progress;
        t
    }

    #[test]
    fn parent_spans_children_with_weighted_progress() {
        let tasks = vec![
            task("1"),
            scheduled("1.1", "2026-03-02", "2026-03-04", 100.0), // 3 days
            scheduled("1.2", "2026-03-05", "2026-03-05", 0.0),   // 1 day
        ];
        let updates = plan_rollup(&h("1.1"), &tasks);

        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert_eq!(update.start, Some(date("2026-03-02")));
        assert_eq!(update.end, Some(date("2026-03-05")));
        assert_eq!(update.duration, Some(4));
        assert!((update.progress - 75.0).abs() < 1e-9);
    }

    #[test]
    fn rollup_cascades_to_higher_ancestors_with_updated_values() {
        let tasks = vec![
            task("1"),
            task("1.1"),
            scheduled("1.1.1", "2026-05-04", "2026-05-08", 40.0),
        ];
        let updates = plan_rollup(&h("1.1.1"), &tasks);

        assert_eq!(updates.len(), 2);
        // nearest ancestor first
        assert_eq!(updates[0].id, tasks[1].id);
        assert_eq!(updates[1].id, tasks[0].id);
        assert_eq!(updates[1].start, Some(date("2026-05-04")));
        assert_eq!(updates[1].end, Some(date("2026-05-08")));
        assert_eq!(updates[1].duration, Some(5));
        assert!((updates[1].progress - 40.0).abs() < 1e-9);
    }

    #[test]
    fn unchanged_ancestors_are_not_emitted() {
        let mut parent = scheduled("1", "2026-03-02", "2026-03-04", 100.0);
        parent.duration = Some(3);
        let tasks = vec![
            parent,
            scheduled("1.1", "2026-03-02", "2026-03-04", 100.0),
        ];

        assert!(plan_rollup(&h("1.1"), &tasks).is_empty());
    }

    #[test]
    fn zero_duration_children_fall_back_to_plain_average() {
        let mut a = task("1.1");
        a.progress = 20.0;
        let mut b = task("1.2");
        b.progress = 60.0;
        let tasks = vec![task("1"), a, b];

        let updates = plan_rollup(&h("1.1"), &tasks);
        assert_eq!(updates.len(), 1);
        assert!((updates[0].progress - 40.0).abs() < 1e-9);
        assert_eq!(updates[0].start, None);
        assert_eq!(updates[0].duration, None);
    }

    #[test]
    fn root_tasks_have_no_ancestors() {
        let tasks = vec![scheduled("1", "2026-03-02", "2026-03-04", 10.0)];
        assert!(plan_rollup(&h("1"), &tasks).is_empty());
    }
}
