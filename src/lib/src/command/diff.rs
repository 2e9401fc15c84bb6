//! Root-to-root diffs: per-table summaries, row-level changes, and the
//! `patch` rendering consumed by `dolt_patch`.

use crate::command;
use crate::core::index::revisions;
use crate::core::prolly::{self, DiffKind};
use crate::core::root::RootValue;
use crate::core::value::{codec, Value};
use crate::error::Result;
use crate::model::diff::{AddRemoveModifyCounts, RowChange, RowChangeKind, TableDiffSummary};
use crate::model::LocalRepository;
use crate::opts::DiffOpts;
use crate::util::cancel::CancelToken;

/// Resolve a revision argument into a root. `WORKING` and `STAGED` read the
/// current working set; everything else goes through revision resolution.
pub fn resolve_root(repo: &LocalRepository, revision: &str) -> Result<RootValue> {
    let store = repo.store();
    match revision {
        "WORKING" => command::current_working_set(repo)?.working_root(),
        "STAGED" => command::current_working_set(repo)?.staged_root(),
        rev => {
            let commit =
                revisions::resolve_commit(&store, Some(&repo.current_branch()?), rev)?;
            RootValue::read(&store, &commit.root)
        }
    }
}

/// Per-table summaries between two revisions (defaults: HEAD vs WORKING)
pub fn diff(repo: &LocalRepository, opts: &DiffOpts) -> Result<Vec<TableDiffSummary>> {
    let from = resolve_root(repo, opts.from_revision.as_deref().unwrap_or("HEAD"))?;
    let to = resolve_root(repo, opts.to_revision.as_deref().unwrap_or("WORKING"))?;
    diff_roots(repo, &from, &to, &opts.tables)
}

pub fn diff_roots(
    repo: &LocalRepository,
    from: &RootValue,
    to: &RootValue,
    table_filter: &[String],
) -> Result<Vec<TableDiffSummary>> {
    let store = repo.store();
    let cancel = CancelToken::new();
    let mut summaries = Vec::new();
    for name in to.changed_tables(from) {
        if !table_filter.is_empty() && !table_filter.contains(&name) {
            continue;
        }
        let from_table = from.get_table(&store, &name)?;
        let to_table = to.get_table(&store, &name)?;
        let mut summary = TableDiffSummary {
            table: name.clone(),
            added_table: from_table.is_none(),
            dropped_table: to_table.is_none(),
            schema_changed: match (&from_table, &to_table) {
                (Some(a), Some(b)) => a.schema != b.schema,
                _ => false,
            },
            counts: AddRemoveModifyCounts::default(),
        };
        let from_tree = from_table
            .as_ref()
            .map(|t| t.primary_tree())
            .unwrap_or_else(|| crate::core::prolly::ProllyTree::empty(store.clone()));
        let to_tree = to_table
            .as_ref()
            .map(|t| t.primary_tree())
            .unwrap_or_else(|| crate::core::prolly::ProllyTree::empty(store.clone()));
        for event in prolly::diff_trees(&from_tree, &to_tree, &cancel)? {
            match event.kind {
                DiffKind::Added { .. } => summary.counts.added += 1,
                DiffKind::Removed { .. } => summary.counts.removed += 1,
                DiffKind::Modified { .. } => summary.counts.modified += 1,
            }
        }
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Row-level changes for one table between two roots
pub fn table_row_changes(
    repo: &LocalRepository,
    from: &RootValue,
    to: &RootValue,
    table: &str,
) -> Result<Vec<RowChange>> {
    let store = repo.store();
    let cancel = CancelToken::new();
    let from_tree = from
        .get_table(&store, table)?
        .map(|t| t.primary_tree())
        .unwrap_or_else(|| crate::core::prolly::ProllyTree::empty(store.clone()));
    let to_tree = to
        .get_table(&store, table)?
        .map(|t| t.primary_tree())
        .unwrap_or_else(|| crate::core::prolly::ProllyTree::empty(store.clone()));
    let mut changes = Vec::new();
    for event in prolly::diff_trees(&from_tree, &to_tree, &cancel)? {
        let decode = |bytes: Option<&[u8]>| bytes.map(codec::decode_tuple).transpose();
        let kind = match event.kind {
            DiffKind::Added { .. } => RowChangeKind::Added,
            DiffKind::Removed { .. } => RowChangeKind::Removed,
            DiffKind::Modified { .. } => RowChangeKind::Modified,
        };
        changes.push(RowChange {
            kind,
            before: decode(event.old())?,
            after: decode(event.new())?,
        });
    }
    Ok(changes)
}

/// Render the diff as SQL-ish patch statements, one per row change
pub fn patch(repo: &LocalRepository, opts: &DiffOpts) -> Result<Vec<String>> {
    let from = resolve_root(repo, opts.from_revision.as_deref().unwrap_or("HEAD"))?;
    let to = resolve_root(repo, opts.to_revision.as_deref().unwrap_or("WORKING"))?;
    let store = repo.store();
    let mut statements = Vec::new();
    for summary in diff_roots(repo, &from, &to, &opts.tables)? {
        let name = &summary.table;
        if summary.added_table {
            statements.push(format!("-- create table {name}"));
        }
        if summary.dropped_table {
            statements.push(format!("DROP TABLE `{name}`;"));
            continue;
        }
        let Some(table) = to.get_table(&store, name)? else {
            continue;
        };
        for change in table_row_changes(repo, &from, &to, name)? {
            let stmt = match change.kind {
                RowChangeKind::Added => {
                    let row = change.after.as_ref().expect("added rows have an after");
                    format!(
                        "INSERT INTO `{name}` ({}) VALUES ({});",
                        table.schema.columns_to_string(),
                        render_values(&table.schema, row)
                    )
                }
                RowChangeKind::Removed => {
                    let row = change.before.as_ref().expect("removed rows have a before");
                    format!("DELETE FROM `{name}` WHERE {};", render_pk(&table.schema, row))
                }
                RowChangeKind::Modified => {
                    let row = change.after.as_ref().expect("modified rows have an after");
                    format!(
                        "UPDATE `{name}` SET {} WHERE {};",
                        render_assignments(&table.schema, row),
                        render_pk(&table.schema, row)
                    )
                }
            };
            statements.push(stmt);
        }
    }
    Ok(statements)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Uint(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Timestamp(micros) => format!("FROM_UNIXTIME({})", *micros as f64 / 1e6),
        other => format!("'{other:?}'"),
    }
}

fn render_values(schema: &crate::model::Schema, row: &crate::core::value::Tuple) -> String {
    schema
        .columns
        .iter()
        .map(|c| render_value(row.get(c.tag).unwrap_or(&Value::Null)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_assignments(schema: &crate::model::Schema, row: &crate::core::value::Tuple) -> String {
    schema
        .columns
        .iter()
        .filter(|c| !schema.primary_key.contains(&c.name))
        .map(|c| {
            format!(
                "`{}` = {}",
                c.name,
                render_value(row.get(c.tag).unwrap_or(&Value::Null))
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_pk(schema: &crate::model::Schema, row: &crate::core::value::Tuple) -> String {
    schema
        .primary_key
        .iter()
        .filter_map(|name| schema.get_column(name))
        .map(|c| {
            format!(
                "`{}` = {}",
                c.name,
                render_value(row.get(c.tag).unwrap_or(&Value::Null))
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    #[test]
    fn test_diff_counts() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 1)?;
            test::set_row(repo, "t", 2, 2)?;
            test::commit_all(repo, "two rows")?;
            test::set_row(repo, "t", 2, 20)?;
            test::set_row(repo, "t", 3, 3)?;
            test::delete_row(repo, "t", 1)?;

            let summaries = diff(repo, &DiffOpts::default())?;
            assert_eq!(summaries.len(), 1);
            let counts = summaries[0].counts;
            assert_eq!((counts.added, counts.removed, counts.modified), (1, 1, 1));
            Ok(())
        });
    }

    #[test]
    fn test_patch_statements() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 10)?;
            let statements = patch(repo, &DiffOpts::default())?;
            assert_eq!(statements.len(), 1);
            assert!(statements[0].starts_with("INSERT INTO `t`"));
            assert!(statements[0].contains("10"));
            Ok(())
        });
    }

    #[test]
    fn test_rename_only_changes_schema_not_rows() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 1)?;
            test::commit_all(repo, "row")?;

            // Rename column c in the working root
            let store = repo.store();
            let mut ws = crate::command::current_working_set(repo)?;
            let mut root = ws.working_root()?;
            let mut table = root.expect_table(&store, "t")?;
            let mut schema = table.schema.clone();
            schema.columns[1].name = "c_renamed".to_string();
            table.set_schema(schema)?;
            root.put_table(&store, &table)?;
            ws.set_working_root(&root)?;
            ws.save()?;

            let summaries = diff(repo, &DiffOpts::default())?;
            assert_eq!(summaries.len(), 1);
            assert!(summaries[0].schema_changed);
            assert_eq!(summaries[0].counts.total(), 0);
            Ok(())
        });
    }
}
