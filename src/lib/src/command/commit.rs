//! Create a commit from the staged root. Handles `-a`/`-A` staging,
//! `--amend`, empty-commit policy, author overrides, and the completion of
//! an in-progress merge (the merge head becomes a second parent).

use chrono::{DateTime, Utc};

use crate::command;
use crate::constants::{ENV_AUTHOR_DATE, ENV_COMMITTER_DATE};
use crate::core::index::commit_writer::signature;
use crate::core::index::refs::{branch_ref, working_set_ref, RefWriter};
use crate::core::index::{CommitReader, CommitWriter};
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::{Commit, LocalRepository};
use crate::opts::CommitOpts;

pub fn commit(repo: &LocalRepository, opts: &CommitOpts) -> Result<Option<Commit>> {
    if opts.allow_empty && opts.skip_empty {
        return Err(DoltError::InvalidArgument(
            "--allow-empty and --skip-empty are mutually exclusive".to_string(),
        ));
    }
    let store = repo.store();
    let mut ws = command::current_working_set(repo)?;
    let reader = CommitReader::new(store.clone());
    let head = reader.get_commit(&ws.data.head)?;
    let head_root = RootValue::read(&store, &head.root)?;

    if opts.all || opts.all_new {
        let working_root = ws.working_root()?;
        if opts.all_new {
            ws.stage(None)?;
        } else {
            // -a stages modified tracked tables, not new ones
            let tracked: Vec<String> = working_root
                .changed_tables(&head_root)
                .into_iter()
                .filter(|name| head_root.has_table(name))
                .collect();
            ws.stage(Some(&tracked))?;
        }
    }

    let staged_root = ws.staged_root()?;

    // Unresolved conflicts and recorded violations block the commit
    let mut conflicted = Vec::new();
    let mut violated = Vec::new();
    for name in staged_root.table_names() {
        let table = staged_root.expect_table(&store, &name)?;
        if table.has_conflicts() {
            conflicted.push(name.clone());
        }
        if table.has_violations() {
            violated.push(name);
        }
    }
    if !conflicted.is_empty() && !opts.force {
        return Err(DoltError::MergeConflict(conflicted.len()));
    }
    if !violated.is_empty() && !opts.force {
        return Err(DoltError::ConstraintViolation(format!(
            "tables with recorded violations: {}",
            violated.join(", ")
        )));
    }

    let merging = ws.data.merge_state.is_some();
    let is_empty = ws.data.staged == head.root;
    if is_empty && !opts.allow_empty && !opts.amend && !merging {
        if opts.skip_empty {
            log::debug!("skipping empty commit");
            return Ok(None);
        }
        return Err(DoltError::InvalidArgument(
            "nothing to commit; use --allow-empty to override".to_string(),
        ));
    }

    let config = repo.config()?;
    let (author_name, author_email) = match &opts.author {
        Some((name, email)) => (name.clone(), email.clone()),
        None => config.user_identity()?,
    };
    let (committer_name, committer_email) = config.user_identity()?;
    let author_when = match opts.date {
        Some(date) => Some(date),
        None => author_date()?,
    };
    let committer_when = match opts.committer_date {
        Some(date) => Some(date),
        None => committer_date()?,
    };

    let message = if opts.message.is_empty() && opts.amend {
        head.message.clone()
    } else {
        opts.message.clone()
    };
    if message.is_empty() {
        return Err(DoltError::InvalidArgument(
            "commit message required".to_string(),
        ));
    }

    let mut parents = if opts.amend {
        head.parent_ids.clone()
    } else {
        vec![head.id]
    };
    if let Some(merge) = &ws.data.merge_state {
        parents.push(merge.merge_head);
    }

    let commit = CommitWriter::new(store.clone()).create_commit(
        ws.data.staged,
        parents,
        signature(author_name, author_email, author_when),
        signature(committer_name, committer_email, committer_when),
        &message,
    )?;

    // Retarget the branch and the working set in one CAS
    let branch = ws.branch.clone();
    ws.data.head = commit.id;
    ws.data.merge_state = None;
    let ws_hash = store.put(&serde_json::to_vec(&ws.data)?)?;
    RefWriter::new(store.clone()).update(|map| {
        map.insert(branch_ref(&branch), commit.id);
        map.insert(working_set_ref(&branch), ws_hash);
        Ok(())
    })?;
    log::debug!("committed {} on {branch}", commit.id);
    Ok(Some(commit))
}

pub fn author_date() -> Result<Option<DateTime<Utc>>> {
    env_date(ENV_AUTHOR_DATE)
}

pub fn committer_date() -> Result<Option<DateTime<Utc>>> {
    env_date(ENV_COMMITTER_DATE)
}

fn env_date(var: &str) -> Result<Option<DateTime<Utc>>> {
    match std::env::var(var) {
        Ok(value) => {
            let parsed = DateTime::parse_from_rfc3339(value.trim()).map_err(|_| {
                DoltError::InvalidArgument(format!("{var} must be an ISO-8601 date: {value:?}"))
            })?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    #[test]
    fn test_commit_root_equals_staged_root() {
        test::run_empty_repo_test(|repo| {
            test::create_table(repo, "t")?;
            test::set_row(repo, "t", 1, 1)?;
            command::add::add_all(repo)?;
            let staged = command::current_working_set(repo)?.data.staged;

            let commit = commit(
                repo,
                &CommitOpts {
                    message: "c1".to_string(),
                    ..Default::default()
                },
            )?
            .unwrap();
            assert_eq!(commit.root, staged);
            assert_eq!(command::head_commit(repo)?.id, commit.id);
            Ok(())
        });
    }

    #[test]
    fn test_empty_commit_rejected_unless_allowed() {
        test::run_table_repo_test(|repo| {
            let err = commit(
                repo,
                &CommitOpts {
                    message: "empty".to_string(),
                    ..Default::default()
                },
            );
            assert!(matches!(err, Err(DoltError::InvalidArgument(_))));

            // --skip-empty exits quietly without creating a commit
            let skipped = commit(
                repo,
                &CommitOpts {
                    message: "empty".to_string(),
                    skip_empty: true,
                    ..Default::default()
                },
            )?;
            assert!(skipped.is_none());

            let allowed = commit(
                repo,
                &CommitOpts {
                    message: "empty".to_string(),
                    allow_empty: true,
                    ..Default::default()
                },
            )?;
            assert!(allowed.is_some());
            Ok(())
        });
    }

    #[test]
    fn test_allow_empty_and_skip_empty_conflict() {
        test::run_table_repo_test(|repo| {
            let err = commit(
                repo,
                &CommitOpts {
                    message: "bad flags".to_string(),
                    allow_empty: true,
                    skip_empty: true,
                    ..Default::default()
                },
            );
            assert!(matches!(err, Err(DoltError::InvalidArgument(_))));
            Ok(())
        });
    }

    #[test]
    fn test_dash_a_stages_tracked_tables_only() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 1)?;
            test::create_table(repo, "brand_new")?;
            let committed = commit(
                repo,
                &CommitOpts {
                    message: "with -a".to_string(),
                    all: true,
                    ..Default::default()
                },
            )?
            .unwrap();
            let store = repo.store();
            let root = crate::core::root::RootValue::read(&store, &committed.root)?;
            let t = root.expect_table(&store, "t")?;
            assert_eq!(t.row_count()?, 1);
            assert!(!root.has_table("brand_new"));
            Ok(())
        });
    }

    #[test]
    fn test_amend_replaces_head() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "original message")?;
            let before = command::head_commit(repo)?;

            test::set_row(repo, "t", 2, 2)?;
            command::add::add_all(repo)?;
            let amended = commit(
                repo,
                &CommitOpts {
                    message: String::new(),
                    amend: true,
                    ..Default::default()
                },
            )?
            .unwrap();
            assert_eq!(amended.message, "original message");
            assert_eq!(amended.parent_ids, before.parent_ids);
            Ok(())
        });
    }
}
