//! Manage named remotes in the repo config.

use crate::core::index::refs::RefWriter;
use crate::error::Result;
use crate::model::{LocalRepository, Remote};

pub fn add(repo: &LocalRepository, name: &str, url: &str) -> Result<()> {
    repo.add_remote(name, url)
}

pub fn remove(repo: &LocalRepository, name: &str) -> Result<()> {
    repo.remove_remote(name)?;
    RefWriter::new(repo.store()).remove_remote_refs(name)
}

pub fn list(repo: &LocalRepository) -> Result<Vec<Remote>> {
    repo.remotes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DoltError;
    use crate::test;

    #[test]
    fn test_add_list_remove() {
        test::run_empty_repo_test(|repo| {
            add(repo, "origin", "file:///tmp/somewhere")?;
            let remotes = list(repo)?;
            assert_eq!(remotes.len(), 1);
            assert_eq!(remotes[0].name, "origin");

            assert!(matches!(
                add(repo, "origin", "file:///tmp/elsewhere"),
                Err(DoltError::AlreadyExists(_))
            ));
            // Same address as an existing remote is refused outright
            assert!(matches!(
                add(repo, "mirror", "file:///tmp/somewhere"),
                Err(DoltError::AlreadyExists(_))
            ));

            remove(repo, "origin")?;
            assert!(list(repo)?.is_empty());
            assert!(matches!(
                remove(repo, "origin"),
                Err(DoltError::NotFound(_))
            ));
            Ok(())
        });
    }
}
