//! Library-wide error type. Every public operation returns
//! `Result<_, DoltError>`; the CLI maps variants onto exit codes and the SQL
//! layer maps them onto MySQL error codes.

use thiserror::Error;

use crate::model::Hash;

#[derive(Error, Debug)]
pub enum DoltError {
    /// No such table, commit, branch, tag, or column
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate table, branch, tag, or column tag
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Operation requires a clean working set
    #[error("cannot {0}: uncommitted changes in the working set")]
    DirtyWorkingSet(String),

    /// Data conflicts were recorded during a merge
    #[error("merge resulted in {0} conflicted table(s); resolve them and commit")]
    MergeConflict(usize),

    /// Table schemas are not mergeable
    #[error("schema conflict on table {0}")]
    SchemaConflict(String),

    /// NOT NULL / CHECK / UNIQUE / FOREIGN KEY failure
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Required commit is a ghost (shallow clone)
    #[error("cannot traverse past commit {0}: you are using a shallow clone")]
    ShallowBoundary(Hash),

    /// Another server holds the database lock
    #[error("database is locked by another process: {0}")]
    LockHeld(String),

    /// On-disk format unsupported by this build
    #[error("unsupported storage format {found:?}, expected {expected:?}")]
    FormatMismatch { found: String, expected: String },

    /// Push rejected because the remote moved ahead
    #[error("rejected non-fast-forward push to {0} (use --force to override)")]
    NonFastForward(String),

    /// No user.name / user.email configured
    #[error("author not configured; set user.name and user.email")]
    AuthMissing,

    /// Syntactic user error
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Caller cancellation
    #[error("operation cancelled")]
    Cancelled,

    /// A bug; should never happen
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DoltError {
    pub fn basic_str(msg: impl AsRef<str>) -> DoltError {
        DoltError::Internal(msg.as_ref().to_string())
    }

    pub fn chunk_not_found(hash: &Hash) -> DoltError {
        DoltError::NotFound(format!("chunk {hash}"))
    }

    pub fn commit_not_found(id: impl std::fmt::Display) -> DoltError {
        DoltError::NotFound(format!("commit {id}"))
    }

    pub fn branch_not_found(name: impl AsRef<str>) -> DoltError {
        DoltError::NotFound(format!("branch {}", name.as_ref()))
    }

    pub fn table_not_found(name: impl AsRef<str>) -> DoltError {
        DoltError::NotFound(format!("table {}", name.as_ref()))
    }

    pub fn revision_not_found(rev: impl AsRef<str>) -> DoltError {
        DoltError::NotFound(format!("revision {}", rev.as_ref()))
    }

    pub fn remote_not_found(name: impl AsRef<str>) -> DoltError {
        DoltError::NotFound(format!("remote {}", name.as_ref()))
    }

    /// Exit code contract: 0 success, 1 user or data error, 2 lock held.
    pub fn exit_code(&self) -> i32 {
        match self {
            DoltError::LockHeld(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, DoltError>;
