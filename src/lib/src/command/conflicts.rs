//! Inspect and resolve recorded merge conflicts. Resolution overwrites the
//! row with the chosen variant and clears the conflict entry; clearing the
//! last entry releases the table for commit.

use crate::command;
use crate::error::{DoltError, Result};
use crate::model::conflict::ConflictEntry;
use crate::model::LocalRepository;
use crate::opts::ResolveChoice;

pub fn list(repo: &LocalRepository, table: &str) -> Result<Vec<ConflictEntry>> {
    let store = repo.store();
    let ws = command::current_working_set(repo)?;
    let root = ws.working_root()?;
    let t = root.expect_table(&store, table)?;
    Ok(t.list_conflicts()?.into_iter().map(|(_, e)| e).collect())
}

pub fn resolve(repo: &LocalRepository, table: &str, choice: ResolveChoice) -> Result<usize> {
    let store = repo.store();
    let mut ws = command::current_working_set(repo)?;
    let mut root = ws.working_root()?;
    let mut t = root.expect_table(&store, table)?;
    let conflicts = t.list_conflicts()?;
    if conflicts.is_empty() {
        return Err(DoltError::NotFound(format!("conflicts in table {table}")));
    }
    let resolved = conflicts.len();
    for (key, entry) in conflicts {
        let chosen = match choice {
            ResolveChoice::Ours => entry.ours.clone(),
            ResolveChoice::Theirs => entry.theirs.clone(),
        };
        match chosen {
            Some(row) => t.put_row(row)?,
            None => {
                // The chosen side deleted the row. The conflict entry is
                // keyed by the row's primary key bytes, so delete by key
                // directly; a row already absent is a no-op.
                t.delete_row_by_key(&key)?;
            }
        }
        t.clear_conflict(&key)?;
    }
    root.put_table(&store, &t)?;
    ws.set_working_root(&root)?;
    // Resolution implies staging the table so commit can proceed
    ws.stage(Some(&[table.to_string()]))?;
    if let Some(state) = ws.data.merge_state.as_mut() {
        state.conflicted_tables.retain(|t| t != table);
    }
    ws.save()?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opts::MergeOpts;
    use crate::test;

    // The keep-a-row paths are exercised end to end in the merge command
    // tests; this covers resolving toward a deletion.
    #[test]
    fn test_resolve_theirs_deletion_removes_row() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "base")?;
            command::branch::create(repo, "right", None)?;

            // Ours modifies the row; theirs deletes it
            test::set_row(repo, "t", 1, 2)?;
            test::commit_all(repo, "modify")?;
            command::checkout::checkout(repo, "right", false)?;
            test::delete_row(repo, "t", 1)?;
            test::commit_all(repo, "delete")?;
            command::checkout::checkout(repo, "main", false)?;

            let outcome = command::merge::merge(repo, "right", &MergeOpts::default())?;
            assert!(matches!(
                outcome,
                command::merge::MergeOutcome::Conflicted { .. }
            ));
            let conflicts = list(repo, "t")?;
            assert_eq!(conflicts.len(), 1);
            assert!(conflicts[0].theirs.is_none());

            resolve(repo, "t", ResolveChoice::Theirs)?;
            test::commit_all(repo, "merge resolved")?;
            assert_eq!(test::get_c(repo, "t", 1)?, None);
            Ok(())
        });
    }
}
