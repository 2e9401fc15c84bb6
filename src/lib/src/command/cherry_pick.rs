//! Cherry-pick: replay one commit onto HEAD. A conflicting pick leaves the
//! conflicts in the working set, exactly like a conflicting merge.

use crate::command;
use crate::command::merge::MergeOutcome;
use crate::core::index::refs::{branch_ref, working_set_ref, RefWriter};
use crate::core::index::{revisions, CommitWriter};
use crate::core::rebase::{cherry_pick_commit, ReplayOutcome};
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::LocalRepository;
use crate::util::cancel::CancelToken;

pub fn cherry_pick(repo: &LocalRepository, revision: &str) -> Result<MergeOutcome> {
    let store = repo.store();
    let branch = repo.current_branch()?;
    let mut ws = command::current_working_set(repo)?;
    if !ws.is_clean() {
        return Err(DoltError::DirtyWorkingSet("cherry-pick".to_string()));
    }
    let target = revisions::resolve_commit(&store, Some(&branch), revision)?;
    if target.is_merge() {
        return Err(DoltError::InvalidArgument(
            "cannot cherry-pick a merge commit".to_string(),
        ));
    }
    let head = command::head_commit(repo)?;
    let head_root = RootValue::read(&store, &head.root)?;

    match cherry_pick_commit(&store, &target, &head_root, &CancelToken::new())? {
        ReplayOutcome::Empty => Ok(MergeOutcome::UpToDate),
        ReplayOutcome::SchemaConflict(tables) => {
            Err(DoltError::SchemaConflict(tables.join(", ")))
        }
        ReplayOutcome::Conflicted(root, stats) => {
            let root_hash = root.write(&store)?;
            ws.start_merge(target.id);
            if let Some(state) = ws.data.merge_state.as_mut() {
                state.conflicted_tables = stats.conflicted_tables.clone();
                state.violated_tables = stats.violated_tables.clone();
            }
            ws.data.working = root_hash;
            ws.data.staged = root_hash;
            ws.save()?;
            Ok(MergeOutcome::Conflicted {
                conflicted_tables: stats.conflicted_tables,
                violated_tables: stats.violated_tables,
                schema_conflicts: stats.schema_conflicts,
            })
        }
        ReplayOutcome::Clean(root) => {
            let config = repo.config()?;
            let (name, email) = config.user_identity()?;
            let sig = crate::core::index::commit_writer::signature(
                name,
                email,
                command::commit::author_date()?,
            );
            let root_hash = root.write(&store)?;
            let commit = CommitWriter::new(store.clone()).create_commit(
                root_hash,
                vec![head.id],
                sig.clone(),
                sig,
                &target.message,
            )?;
            ws.reset_hard(commit.id, root_hash);
            let ws_hash = store.put(&serde_json::to_vec(&ws.data)?)?;
            RefWriter::new(store.clone()).update(|map| {
                map.insert(branch_ref(&branch), commit.id);
                map.insert(working_set_ref(&branch), ws_hash);
                Ok(())
            })?;
            Ok(MergeOutcome::Merged(commit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    #[test]
    fn test_cherry_pick_applies_one_commit() {
        test::run_table_repo_test(|repo| {
            command::branch::create(repo, "feature", None)?;
            command::checkout::checkout(repo, "feature", false)?;
            test::set_row(repo, "t", 1, 1)?;
            let picked = test::commit_all(repo, "pickable")?;
            test::set_row(repo, "t", 2, 2)?;
            test::commit_all(repo, "not picked")?;

            command::checkout::checkout(repo, "main", false)?;
            let outcome = cherry_pick(repo, &picked.id.to_hex())?;
            match outcome {
                MergeOutcome::Merged(c) => assert_eq!(c.message, "pickable"),
                other => panic!("expected a commit, got {other:?}"),
            }
            assert_eq!(test::get_c(repo, "t", 1)?, Some(1));
            assert_eq!(test::get_c(repo, "t", 2)?, None);
            Ok(())
        });
    }

    #[test]
    fn test_conflicting_cherry_pick_records_conflicts() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "base")?;
            command::branch::create(repo, "feature", None)?;

            command::checkout::checkout(repo, "feature", false)?;
            test::set_row(repo, "t", 1, 100)?;
            let picked = test::commit_all(repo, "their change")?;

            command::checkout::checkout(repo, "main", false)?;
            test::set_row(repo, "t", 1, 200)?;
            test::commit_all(repo, "our change")?;

            let outcome = cherry_pick(repo, &picked.id.to_hex())?;
            assert!(matches!(outcome, MergeOutcome::Conflicted { .. }));
            let conflicts = command::conflicts::list(repo, "t")?;
            assert_eq!(conflicts.len(), 1);
            Ok(())
        });
    }
}
