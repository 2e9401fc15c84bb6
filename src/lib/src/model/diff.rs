use serde::{Deserialize, Serialize};

use crate::core::value::Tuple;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddRemoveModifyCounts {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl AddRemoveModifyCounts {
    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChangeKind {
    Added,
    Removed,
    Modified,
}

/// One changed row between two revisions of a table
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub kind: RowChangeKind,
    pub before: Option<Tuple>,
    pub after: Option<Tuple>,
}

/// Per-table diff summary between two roots
#[derive(Debug, Clone, PartialEq)]
pub struct TableDiffSummary {
    pub table: String,
    pub added_table: bool,
    pub dropped_table: bool,
    pub schema_changed: bool,
    pub counts: AddRemoveModifyCounts,
}

impl TableDiffSummary {
    pub fn has_changes(&self) -> bool {
        self.added_table || self.dropped_table || self.schema_changed || self.counts.total() > 0
    }
}
