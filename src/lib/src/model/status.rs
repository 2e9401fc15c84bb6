use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Added,
    Modified,
    Dropped,
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableStatus::Added => write!(f, "new table"),
            TableStatus::Modified => write!(f, "modified"),
            TableStatus::Dropped => write!(f, "deleted"),
        }
    }
}

/// What `status` reports: which tables are staged for commit, which carry
/// unstaged edits, and which are blocked on conflicts or violations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedData {
    pub staged_tables: Vec<(String, TableStatus)>,
    pub unstaged_tables: Vec<(String, TableStatus)>,
    pub conflicted_tables: Vec<String>,
    pub violated_tables: Vec<String>,
    pub merge_in_progress: bool,
    pub rebase_in_progress: bool,
}

impl StagedData {
    pub fn empty() -> StagedData {
        StagedData::default()
    }

    pub fn is_clean(&self) -> bool {
        self.staged_tables.is_empty()
            && self.unstaged_tables.is_empty()
            && self.conflicted_tables.is_empty()
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged_tables.is_empty()
    }
}
