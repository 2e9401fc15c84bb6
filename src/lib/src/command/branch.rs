//! Branch management: create, delete, list. A branch is a named pointer to
//! one commit; its working set is created lazily at checkout.

use crate::command;
use crate::core::index::refs::{RefReader, RefWriter};
use crate::core::index::revisions;
use crate::error::{DoltError, Result};
use crate::model::{Branch, LocalRepository};

/// Create a branch at HEAD, or at `start_point` when given
pub fn create(repo: &LocalRepository, name: &str, start_point: Option<&str>) -> Result<Branch> {
    let store = repo.store();
    let commit = match start_point {
        Some(rev) => {
            revisions::resolve_commit(&store, Some(&repo.current_branch()?), rev)?
        }
        None => command::head_commit(repo)?,
    };
    RefWriter::new(store).create_branch(name, commit.id)?;
    Ok(Branch {
        name: name.to_string(),
        commit_id: commit.id,
    })
}

pub fn delete(repo: &LocalRepository, name: &str, force: bool) -> Result<()> {
    if repo.current_branch()? == name {
        return Err(DoltError::InvalidArgument(format!(
            "cannot delete the checked-out branch {name}"
        )));
    }
    let store = repo.store();
    if !force {
        // A branch whose commits are not reachable from any other branch
        // would orphan work; require -f for that
        let reader = crate::core::index::CommitReader::new(store.clone());
        let target = RefReader::new(store.clone()).expect_branch(name)?;
        let mut merged = false;
        for other in RefReader::new(store.clone()).list_branches()? {
            if other.name != name && reader.is_ancestor(&target.commit_id, &other.commit_id)? {
                merged = true;
                break;
            }
        }
        if !merged {
            return Err(DoltError::InvalidArgument(format!(
                "branch {name} is not fully merged; use -f to delete anyway"
            )));
        }
    }
    RefWriter::new(store).delete_branch(name)
}

pub fn list(repo: &LocalRepository) -> Result<Vec<Branch>> {
    RefReader::new(repo.store()).list_branches()
}

pub fn current(repo: &LocalRepository) -> Result<String> {
    repo.current_branch()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    #[test]
    fn test_create_list_delete() {
        test::run_table_repo_test(|repo| {
            create(repo, "feature", None)?;
            let names: Vec<String> = list(repo)?.into_iter().map(|b| b.name).collect();
            assert!(names.contains(&"feature".to_string()));

            assert!(matches!(
                create(repo, "feature", None),
                Err(DoltError::AlreadyExists(_))
            ));

            // Fully merged (same commit), deletable without force
            delete(repo, "feature", false)?;
            let names: Vec<String> = list(repo)?.into_iter().map(|b| b.name).collect();
            assert!(!names.contains(&"feature".to_string()));
            Ok(())
        });
    }

    #[test]
    fn test_cannot_delete_checked_out_branch() {
        test::run_table_repo_test(|repo| {
            let branch = current(repo)?;
            assert!(matches!(
                delete(repo, &branch, true),
                Err(DoltError::InvalidArgument(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn test_branch_name_validation() {
        test::run_table_repo_test(|repo| {
            for bad in ["a..b", "/x", "x/", "has space"] {
                assert!(matches!(
                    create(repo, bad, None),
                    Err(DoltError::InvalidArgument(_))
                ));
            }
            Ok(())
        });
    }
}
