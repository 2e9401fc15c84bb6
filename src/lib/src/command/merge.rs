//! The merge driver: strategy selection, fast-forward handling, the
//! three-way root merge, and merge-state bookkeeping on the working set.

use crate::command;
use crate::core::index::refs::{branch_ref, working_set_ref, RefWriter};
use crate::core::index::{revisions, CommitReader, CommitWriter};
use crate::core::merge::{Merger, MergeStrategy};
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::{Commit, Hash, LocalRepository};
use crate::opts::MergeOpts;
use crate::util::cancel::CancelToken;

#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// Theirs is already an ancestor of ours
    UpToDate,
    /// The branch pointer moved forward without a new commit
    FastForward(Commit),
    /// A merge commit was created
    Merged(Commit),
    /// The merged result is staged; `commit` will finish the merge
    Staged,
    /// Conflicts or violations were recorded; resolve and commit
    Conflicted {
        conflicted_tables: Vec<String>,
        violated_tables: Vec<String>,
        schema_conflicts: Vec<String>,
    },
}

pub fn merge(repo: &LocalRepository, revision: &str, opts: &MergeOpts) -> Result<MergeOutcome> {
    let store = repo.store();
    let cancel = CancelToken::new();
    let branch = repo.current_branch()?;
    let mut ws = command::current_working_set(repo)?;
    if ws.data.merge_state.is_some() {
        return Err(DoltError::InvalidArgument(
            "a merge is already in progress; resolve it or run merge --abort".to_string(),
        ));
    }

    let reader = CommitReader::new(store.clone());
    let ours = reader.get_commit(&ws.data.head)?;
    let theirs = revisions::resolve_commit(&store, Some(&branch), revision)?;

    if ours.id == theirs.id {
        return Ok(MergeOutcome::UpToDate);
    }
    let base = reader.merge_base(&ours.id, &theirs.id)?;
    if base.id == theirs.id {
        return Ok(MergeOutcome::UpToDate);
    }

    let base_root = RootValue::read(&store, &base.root)?;
    let theirs_root = RootValue::read(&store, &theirs.root)?;
    let affected = theirs_root.changed_tables(&base_root);
    command::check_tables_clean(repo, &ws, &affected, "merge")?;

    let ours_root = RootValue::read(&store, &ours.root)?;
    let working_root = ws.working_root()?;

    if base.id == ours.id {
        // Fast-forward territory
        match opts.strategy {
            MergeStrategy::NoFf => {}
            MergeStrategy::Squash => {
                let theirs_root_value = RootValue::read(&store, &theirs.root)?;
                let carried =
                    carry_working_changes(&store, &ours_root, &working_root, &theirs_root_value)?;
                ws.data.working = carried;
                ws.data.staged = theirs.root;
                ws.save()?;
                return Ok(MergeOutcome::Staged);
            }
            MergeStrategy::FfOnly | MergeStrategy::ThreeWay => {
                let theirs_root_value = RootValue::read(&store, &theirs.root)?;
                let carried =
                    carry_working_changes(&store, &ours_root, &working_root, &theirs_root_value)?;
                ws.data.head = theirs.id;
                ws.data.staged = theirs.root;
                ws.data.working = carried;
                let ws_hash = store.put(&serde_json::to_vec(&ws.data)?)?;
                RefWriter::new(store.clone()).update(|map| {
                    map.insert(branch_ref(&branch), theirs.id);
                    map.insert(working_set_ref(&branch), ws_hash);
                    Ok(())
                })?;
                log::debug!("fast-forwarded {branch} to {}", theirs.id);
                return Ok(MergeOutcome::FastForward(theirs));
            }
        }
    } else if opts.strategy == MergeStrategy::FfOnly {
        return Err(DoltError::InvalidArgument(format!(
            "cannot fast-forward to {revision}"
        )));
    }

    let merger = Merger::new(store.clone(), cancel);
    let (merged_root, stats) = merger.merge_roots(&base_root, &ours_root, &theirs_root)?;
    let merged_hash = merged_root.write(&store)?;
    let carried = carry_working_changes(&store, &ours_root, &working_root, &merged_root)?;

    if !stats.is_clean() {
        ws.start_merge(theirs.id);
        if let Some(state) = ws.data.merge_state.as_mut() {
            state.conflicted_tables = stats.conflicted_tables.clone();
            state.violated_tables = stats.violated_tables.clone();
        }
        ws.data.working = carried;
        ws.data.staged = merged_hash;
        ws.save()?;
        return Ok(MergeOutcome::Conflicted {
            conflicted_tables: stats.conflicted_tables,
            violated_tables: stats.violated_tables,
            schema_conflicts: stats.schema_conflicts,
        });
    }

    if opts.strategy == MergeStrategy::Squash {
        ws.data.working = carried;
        ws.data.staged = merged_hash;
        ws.save()?;
        return Ok(MergeOutcome::Staged);
    }

    if opts.no_commit {
        ws.start_merge(theirs.id);
        ws.data.working = carried;
        ws.data.staged = merged_hash;
        ws.save()?;
        return Ok(MergeOutcome::Staged);
    }

    let config = repo.config()?;
    let (name, email) = config.user_identity()?;
    let message = opts
        .message
        .clone()
        .unwrap_or_else(|| format!("Merge {revision} into {branch}"));
    let sig = crate::core::index::commit_writer::signature(
        name,
        email,
        command::commit::author_date()?,
    );
    let commit = CommitWriter::new(store.clone()).create_commit(
        merged_hash,
        vec![ours.id, theirs.id],
        sig.clone(),
        sig,
        &message,
    )?;

    ws.data.head = commit.id;
    ws.data.working = carried;
    ws.data.staged = merged_hash;
    ws.data.merge_state = None;
    let ws_hash = store.put(&serde_json::to_vec(&ws.data)?)?;
    RefWriter::new(store.clone()).update(|map| {
        map.insert(branch_ref(&branch), commit.id);
        map.insert(working_set_ref(&branch), ws_hash);
        Ok(())
    })?;
    log::debug!("merged {revision} into {branch} as {}", commit.id);
    Ok(MergeOutcome::Merged(commit))
}

/// Re-apply dirty-but-unaffected tables from the pre-merge working root
/// onto the merge result, so unrelated working-set changes survive. The
/// dirty-tables guard already rejected overlap with the merge.
fn carry_working_changes(
    store: &crate::core::db::StoreRef,
    head_root: &RootValue,
    working_root: &RootValue,
    result_root: &RootValue,
) -> Result<Hash> {
    let mut carried = result_root.clone();
    for name in working_root.changed_tables(head_root) {
        match working_root.tables.get(&name) {
            Some(hash) => {
                carried.tables.insert(name, *hash);
            }
            None => {
                carried.tables.remove(&name);
            }
        }
    }
    carried.write(store)
}

/// Abort an in-progress merge: restore the pre-merge working root, keep
/// unrelated working-set changes, clear merge state.
pub fn abort(repo: &LocalRepository) -> Result<()> {
    let mut ws = command::current_working_set(repo)?;
    ws.abort_merge()?;
    ws.data.staged = {
        let reader = CommitReader::new(repo.store());
        reader.get_commit(&ws.data.head)?.root
    };
    ws.save()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    /// Build the classic fork: base row (1,1); left sets c=2, right sets c=3
    fn forked_repo(repo: &crate::model::LocalRepository) -> Result<()> {
        test::set_row(repo, "t", 1, 1)?;
        test::commit_all(repo, "base")?;
        command::branch::create(repo, "right", None)?;

        test::set_row(repo, "t", 1, 2)?;
        test::commit_all(repo, "left edit")?;

        command::checkout::checkout(repo, "right", false)?;
        test::set_row(repo, "t", 1, 3)?;
        test::commit_all(repo, "right edit")?;
        command::checkout::checkout(repo, "main", false)?;
        Ok(())
    }

    #[test]
    fn test_fast_forward_moves_branch() {
        test::run_table_repo_test(|repo| {
            command::branch::create(repo, "feature", None)?;
            command::checkout::checkout(repo, "feature", false)?;
            test::set_row(repo, "t", 1, 1)?;
            let ahead = test::commit_all(repo, "ahead")?;
            command::checkout::checkout(repo, "main", false)?;

            let outcome = merge(repo, "feature", &MergeOpts::default())?;
            match outcome {
                MergeOutcome::FastForward(c) => assert_eq!(c.id, ahead.id),
                other => panic!("expected fast-forward, got {other:?}"),
            }
            assert_eq!(command::head_commit(repo)?.id, ahead.id);
            Ok(())
        });
    }

    #[test]
    fn test_merge_base_equals_theirs_is_up_to_date() {
        test::run_table_repo_test(|repo| {
            command::branch::create(repo, "behind", None)?;
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "ahead of behind")?;
            let outcome = merge(repo, "behind", &MergeOpts::default())?;
            assert!(matches!(outcome, MergeOutcome::UpToDate));
            Ok(())
        });
    }

    #[test]
    fn test_three_way_merge_commit() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "base")?;
            command::branch::create(repo, "other", None)?;

            test::set_row(repo, "t", 2, 2)?;
            test::commit_all(repo, "ours")?;

            command::checkout::checkout(repo, "other", false)?;
            test::set_row(repo, "t", 3, 3)?;
            test::commit_all(repo, "theirs")?;
            command::checkout::checkout(repo, "main", false)?;

            let outcome = merge(repo, "other", &MergeOpts::default())?;
            let commit = match outcome {
                MergeOutcome::Merged(c) => c,
                other => panic!("expected merge commit, got {other:?}"),
            };
            assert_eq!(commit.parent_ids.len(), 2);
            assert_eq!(test::get_c(repo, "t", 2)?, Some(2));
            assert_eq!(test::get_c(repo, "t", 3)?, Some(3));
            Ok(())
        });
    }

    #[test]
    fn test_conflict_recorded_then_resolve_theirs() {
        test::run_table_repo_test(|repo| {
            forked_repo(repo)?;

            let outcome = merge(repo, "right", &MergeOpts::default())?;
            match &outcome {
                MergeOutcome::Conflicted {
                    conflicted_tables, ..
                } => assert_eq!(conflicted_tables, &vec!["t".to_string()]),
                other => panic!("expected conflicts, got {other:?}"),
            }

            // Commit is blocked while conflicts stand
            let blocked = command::commit::commit(
                repo,
                &crate::opts::CommitOpts {
                    message: "should fail".to_string(),
                    ..Default::default()
                },
            );
            assert!(matches!(blocked, Err(DoltError::MergeConflict(_))));

            // Inspect the recorded conflict
            let conflicts = command::conflicts::list(repo, "t")?;
            assert_eq!(conflicts.len(), 1);
            let entry = &conflicts[0];
            assert_eq!(
                entry.base.as_ref().unwrap().get(2),
                Some(&crate::core::value::Value::Int(1))
            );
            assert_eq!(
                entry.ours.as_ref().unwrap().get(2),
                Some(&crate::core::value::Value::Int(2))
            );
            assert_eq!(
                entry.theirs.as_ref().unwrap().get(2),
                Some(&crate::core::value::Value::Int(3))
            );

            // Resolve theirs, commit, observe c=3
            command::conflicts::resolve(repo, "t", crate::opts::ResolveChoice::Theirs)?;
            test::commit_all(repo, "merge resolved")?;
            assert_eq!(test::get_c(repo, "t", 1)?, Some(3));
            let head = command::head_commit(repo)?;
            assert_eq!(head.parent_ids.len(), 2);
            Ok(())
        });
    }

    #[test]
    fn test_merge_abort_restores_pre_merge_state() {
        test::run_table_repo_test(|repo| {
            forked_repo(repo)?;
            let before = command::current_working_set(repo)?.data.working;

            let outcome = merge(repo, "right", &MergeOpts::default())?;
            assert!(matches!(outcome, MergeOutcome::Conflicted { .. }));

            abort(repo)?;
            let ws = command::current_working_set(repo)?;
            assert_eq!(ws.data.working, before);
            assert!(ws.data.merge_state.is_none());
            assert_eq!(test::get_c(repo, "t", 1)?, Some(2));
            Ok(())
        });
    }

    #[test]
    fn test_dirty_working_set_blocks_merge() {
        test::run_table_repo_test(|repo| {
            forked_repo(repo)?;
            // Unstaged edit to the table the merge would touch
            test::set_row(repo, "t", 1, 99)?;
            assert!(matches!(
                merge(repo, "right", &MergeOpts::default()),
                Err(DoltError::DirtyWorkingSet(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn test_ff_only_refuses_real_merge() {
        test::run_table_repo_test(|repo| {
            forked_repo(repo)?;
            let result = merge(
                repo,
                "right",
                &MergeOpts {
                    strategy: MergeStrategy::FfOnly,
                    ..Default::default()
                },
            );
            assert!(matches!(result, Err(DoltError::InvalidArgument(_))));
            Ok(())
        });
    }
}
