//! Stage tables from the working root into the staged root.

use crate::command;
use crate::error::Result;
use crate::model::LocalRepository;

pub fn add(repo: &LocalRepository, tables: &[String]) -> Result<()> {
    let mut ws = command::current_working_set(repo)?;
    ws.stage(Some(tables))?;
    ws.save()
}

pub fn add_all(repo: &LocalRepository) -> Result<()> {
    let mut ws = command::current_working_set(repo)?;
    ws.stage(None)?;
    ws.save()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command;
    use crate::model::TableStatus;
    use crate::test;

    #[test]
    fn test_add_moves_table_to_staged() {
        test::run_empty_repo_test(|repo| {
            test::create_table(repo, "t")?;
            let status = command::status(repo)?;
            assert_eq!(
                status.unstaged_tables,
                vec![("t".to_string(), TableStatus::Added)]
            );
            assert!(status.staged_tables.is_empty());

            add(repo, &["t".to_string()])?;
            let status = command::status(repo)?;
            assert_eq!(
                status.staged_tables,
                vec![("t".to_string(), TableStatus::Added)]
            );
            assert!(status.unstaged_tables.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_add_unknown_table_errors() {
        test::run_empty_repo_test(|repo| {
            assert!(add(repo, &["missing".to_string()]).is_err());
            Ok(())
        });
    }
}
