//! Operation log and undo data.
//!
//! Every committed structural operation appends a record carrying the
//! pre-operation values of each touched task, enough to build the exact
//! inverse batch. The log is per-coordinator and in-memory; it exists
//! for undo, not audit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::hierarchy::HierarchyNumber;
use crate::task::TaskId;

/// Pre-operation hierarchy number of one renumbered task.
#[derive(Debug, Clone, Serialize)]
pub struct PriorNumber {
    pub id: TaskId,
    pub number: HierarchyNumber,
}

/// Pre-operation predecessor list of one remapped task.
#[derive(Debug, Clone, Serialize)]
pub struct PriorPredecessors {
    pub id: TaskId,
    pub predecessors: Vec<HierarchyNumber>,
}

/// Everything needed to invert one committed operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UndoData {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub numbers: Vec<PriorNumber>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub predecessors: Vec<PriorPredecessors>,
}

impl UndoData {
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty() && self.predecessors.is_empty()
    }
}

/// One committed operation.
#[derive(Debug, Clone, Serialize)]
pub struct OpRecord {
    pub op_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Verb of the operation ("indent", "outdent", ...).
    pub action: String,
    /// The task the user operated on.
    pub task: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo_data: Option<UndoData>,
}

impl OpRecord {
    pub fn new(action: impl Into<String>, task: TaskId, actor: Option<String>) -> Self {
        Self {
            op_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: action.into(),
            task,
            actor,
            undo_data: None,
        }
    }
}

/// Append-only log of committed operations, newest last.
#[derive(Debug, Default)]
pub struct OpLog {
    records: Vec<OpRecord>,
}

impl OpLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: OpRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[OpRecord] {
        &self.records
    }

    /// The most recent record that carries undo data.
    pub fn latest_undoable(&self) -> Option<&OpRecord> {
        self.records
            .iter()
            .rev()
            .find(|record| record.undo_data.as_ref().is_some_and(|u| !u.is_empty()))
    }

    /// Remove and return the most recent undoable record with its
    /// position, so a failed undo can put it back where it was.
    pub fn take_latest_undoable(&mut self) -> Option<(usize, OpRecord)> {
        let index = self
            .records
            .iter()
            .rposition(|record| record.undo_data.as_ref().is_some_and(|u| !u.is_empty()))?;
        Some((index, self.records.remove(index)))
    }

    /// Put a taken record back at its original position.
    pub fn restore(&mut self, index: usize, record: OpRecord) {
        let index = index.min(self.records.len());
        self.records.insert(index, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(raw: &str) -> HierarchyNumber {
        raw.parse().unwrap()
    }

    #[test]
    fn latest_undoable_skips_records_without_undo_data() {
        let mut log = OpLog::new();
        let task = TaskId::new_v4();

        let mut undoable = OpRecord::new("indent", task, None);
        undoable.undo_data = Some(UndoData {
            numbers: vec![PriorNumber {
                id: task,
                number: h("2"),
            }],
            ..UndoData::default()
        });
        let undoable_id = undoable.op_id;

        log.append(undoable);
        log.append(OpRecord::new("insert", task, None));

        assert_eq!(log.latest_undoable().map(|r| r.op_id), Some(undoable_id));
        let (index, taken) = log.take_latest_undoable().unwrap();
        assert_eq!(index, 0);
        assert_eq!(taken.op_id, undoable_id);
        assert!(log.take_latest_undoable().is_none());
        assert_eq!(log.records().len(), 1);
    }

    #[test]
    fn restore_puts_a_taken_record_back_in_place() {
        let mut log = OpLog::new();
        let task = TaskId::new_v4();

        let mut undoable = OpRecord::new("indent", task, None);
        undoable.undo_data = Some(UndoData {
            numbers: vec![PriorNumber {
                id: task,
                number: h("2"),
            }],
            ..UndoData::default()
        });
        log.append(undoable);
        log.append(OpRecord::new("insert", task, None));

        let (index, taken) = log.take_latest_undoable().unwrap();
        log.restore(index, taken);

        let actions: Vec<&str> = log.records().iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["indent", "insert"]);
    }
}
