//! Option structs for the command verbs, mirroring the CLI flags one to one
//! so the procedure forms share the exact same contract.

use chrono::{DateTime, Utc};

use crate::core::merge::MergeStrategy;
use crate::core::rebase::{EmptyCommitPolicy, PlanEntry};

#[derive(Debug, Clone, Default)]
pub struct CommitOpts {
    pub message: String,
    /// `-a`: stage every modified tracked table before committing
    pub all: bool,
    /// `-A`: stage everything, including new and dropped tables
    pub all_new: bool,
    pub amend: bool,
    pub allow_empty: bool,
    /// Mutually exclusive with `allow_empty`: exit quietly without a commit
    pub skip_empty: bool,
    pub force: bool,
    /// `--author "Name <email>"`
    pub author: Option<(String, String)>,
    pub date: Option<DateTime<Utc>>,
    pub committer_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct LogOpts {
    /// Branch, tag, hash, or `BASE..HEAD` range; defaults to HEAD
    pub revision: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOpts {
    pub strategy: MergeStrategy,
    pub no_commit: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResetOpts {
    pub hard: bool,
    pub revision: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CloneOpts {
    pub url: String,
    pub branch: Option<String>,
    pub depth: Option<usize>,
    pub remote_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct PushOpts {
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOpts {
    pub remote: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PullOpts {
    pub remote: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RebaseOpts {
    pub upstream: String,
    /// Interactive plan; `None` uses the default pick-everything plan
    pub plan: Option<Vec<PlanEntry>>,
    pub empty_policy: EmptyCommitPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct DiffOpts {
    pub from_revision: Option<String>,
    pub to_revision: Option<String>,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveChoice {
    Ours,
    Theirs,
}
