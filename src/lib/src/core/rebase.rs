//! Rebase: replay a range of commits onto a new base by iterated three-way
//! merge. The interactive plan and its progress live in `RebaseState`,
//! persisted inside the working set, so pause/continue/abort is a state
//! machine rather than a suspended computation. Revert and cherry-pick are
//! single replays with the ancestor synthesized from the target commit.

use serde::{Deserialize, Serialize};

use crate::core::db::StoreRef;
use crate::core::index::commit_reader::CommitReader;
use crate::core::merge::{Merger, RootMergeStats};
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::{Commit, Hash};
use crate::util::cancel::CancelToken;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RebaseAction {
    Pick,
    Reword,
    Squash,
    Fixup,
    Drop,
    Edit,
}

impl RebaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebaseAction::Pick => "pick",
            RebaseAction::Reword => "reword",
            RebaseAction::Squash => "squash",
            RebaseAction::Fixup => "fixup",
            RebaseAction::Drop => "drop",
            RebaseAction::Edit => "edit",
        }
    }

    pub fn from_str(s: &str) -> Result<RebaseAction> {
        match s {
            "pick" | "p" => Ok(RebaseAction::Pick),
            "reword" | "r" => Ok(RebaseAction::Reword),
            "squash" | "s" => Ok(RebaseAction::Squash),
            "fixup" | "f" => Ok(RebaseAction::Fixup),
            "drop" | "d" => Ok(RebaseAction::Drop),
            "edit" | "e" => Ok(RebaseAction::Edit),
            other => Err(DoltError::InvalidArgument(format!(
                "unknown rebase action {other:?}"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub action: RebaseAction,
    pub commit: Hash,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PauseKind {
    /// Stopped on a data conflict; resolve on the working branch, continue
    Conflict,
    /// Stopped after an `edit` entry; amend on the working branch, continue
    Edit,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCommitPolicy {
    Keep,
    #[default]
    Drop,
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RebaseState {
    pub original_head: Hash,
    pub onto: Hash,
    pub target_branch: String,
    pub working_branch: String,
    pub plan: Vec<PlanEntry>,
    pub plan_index: usize,
    pub output_head: Hash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<PauseKind>,
    #[serde(default)]
    pub empty_policy: EmptyCommitPolicy,
}

/// The default interactive plan: one `pick` per non-merge commit reachable
/// from `head` but not `upstream`, oldest first. Merge commits are skipped.
pub fn default_plan(reader: &CommitReader, upstream: &Hash, head: &Hash) -> Result<Vec<PlanEntry>> {
    let range = reader.commits_between(upstream, head)?;
    Ok(range
        .into_iter()
        .filter(|c| !c.is_merge())
        .map(|c| PlanEntry {
            action: RebaseAction::Pick,
            commit: c.id,
            message: c.message,
        })
        .collect())
}

/// What one replay produced
pub enum ReplayOutcome {
    /// Clean merge; the new root to commit
    Clean(RootValue),
    /// Replaying changed nothing relative to the output head
    Empty,
    /// Data conflicts were recorded into the returned root
    Conflicted(RootValue, RootMergeStats),
    /// Schemas were not mergeable; rebase must auto-abort
    SchemaConflict(Vec<String>),
}

/// Replay `source` onto `output_root`: a three-way merge with the source
/// commit's first parent as the base.
pub fn replay_commit(
    store: &StoreRef,
    source: &Commit,
    output_root: &RootValue,
    cancel: &CancelToken,
) -> Result<ReplayOutcome> {
    let reader = CommitReader::new(store.clone());
    let base_root = match source.parent_ids.first() {
        Some(parent) => {
            if store.is_ghost(parent) {
                return Err(DoltError::ShallowBoundary(*parent));
            }
            RootValue::read(store, &reader.get_commit(parent)?.root)?
        }
        None => RootValue::empty(),
    };
    let theirs_root = RootValue::read(store, &source.root)?;
    merge_for_replay(store, &base_root, output_root, &theirs_root, cancel)
}

/// Revert: apply the inverse diff of `target` onto `ours`, a three-way merge
/// with base = target and theirs = target's parent.
pub fn revert_commit(
    store: &StoreRef,
    target: &Commit,
    ours_root: &RootValue,
    cancel: &CancelToken,
) -> Result<ReplayOutcome> {
    let reader = CommitReader::new(store.clone());
    let base_root = RootValue::read(store, &target.root)?;
    let theirs_root = match target.parent_ids.first() {
        Some(parent) => {
            if store.is_ghost(parent) {
                return Err(DoltError::ShallowBoundary(*parent));
            }
            RootValue::read(store, &reader.get_commit(parent)?.root)?
        }
        None => RootValue::empty(),
    };
    merge_for_replay(store, &base_root, ours_root, &theirs_root, cancel)
}

/// Cherry-pick is a replay of one commit onto HEAD
pub fn cherry_pick_commit(
    store: &StoreRef,
    target: &Commit,
    ours_root: &RootValue,
    cancel: &CancelToken,
) -> Result<ReplayOutcome> {
    replay_commit(store, target, ours_root, cancel)
}

fn merge_for_replay(
    store: &StoreRef,
    base: &RootValue,
    ours: &RootValue,
    theirs: &RootValue,
    cancel: &CancelToken,
) -> Result<ReplayOutcome> {
    let merger = Merger::new(store.clone(), cancel.clone());
    let (merged, stats) = merger.merge_roots(base, ours, theirs)?;
    if !stats.schema_conflicts.is_empty() {
        return Ok(ReplayOutcome::SchemaConflict(stats.schema_conflicts));
    }
    if !stats.conflicted_tables.is_empty() || !stats.violated_tables.is_empty() {
        return Ok(ReplayOutcome::Conflicted(merged, stats));
    }
    let ours_hash = ours.write(store)?;
    let merged_hash = merged.write(store)?;
    if merged_hash == ours_hash {
        return Ok(ReplayOutcome::Empty);
    }
    Ok(ReplayOutcome::Clean(merged))
}

/// Combined message for a squash entry; fixup keeps only the previous one
pub fn squash_message(previous: &str, incoming: &str, action: RebaseAction) -> String {
    match action {
        RebaseAction::Fixup => previous.to_string(),
        _ => format!("{previous}\n\n{incoming}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(RebaseAction::from_str("pick").unwrap(), RebaseAction::Pick);
        assert_eq!(RebaseAction::from_str("s").unwrap(), RebaseAction::Squash);
        assert!(RebaseAction::from_str("yolo").is_err());
    }

    #[test]
    fn test_squash_message_concatenates_fixup_keeps() {
        assert_eq!(
            squash_message("first", "second", RebaseAction::Squash),
            "first\n\nsecond"
        );
        assert_eq!(
            squash_message("first", "second", RebaseAction::Fixup),
            "first"
        );
    }
}
