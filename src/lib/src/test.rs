//! Test support: temp-dir repositories with a configured identity, plus
//! helpers to build small committed tables. Mirrors the way the command
//! tests drive the library end to end.

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::command;
use crate::constants::{ENV_ROOT_PATH, GLOBAL_CONFIG_FILENAME};
use crate::core::value::{Tuple, Value};
use crate::error::Result;
use crate::model::schema::{Column, DataType, Schema};
use crate::model::{Commit, LocalRepository};
use crate::opts::CommitOpts;

/// Point DOLT_ROOT_PATH at a per-process home carrying a test identity
pub fn ensure_test_home() -> &'static PathBuf {
    static HOME: OnceLock<PathBuf> = OnceLock::new();
    HOME.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("dolt-test-home-{}", std::process::id()));
        std::fs::create_dir_all(dir.join(".dolt")).unwrap();
        let config = serde_json::json!({
            "user.name": "Test User",
            "user.email": "test@example.com",
            "metrics.disabled": "true",
        });
        std::fs::write(
            dir.join(".dolt").join(GLOBAL_CONFIG_FILENAME),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();
        std::env::set_var(ENV_ROOT_PATH, &dir);
        dir
    })
}

/// Run a test against a freshly initialized repository
pub fn run_empty_repo_test<F>(test: F)
where
    F: FnOnce(&LocalRepository) -> Result<()>,
{
    ensure_test_home();
    let dir = tempfile::tempdir().unwrap();
    let repo = command::init(dir.path()).unwrap();
    test(&repo).unwrap();
}

/// Run a test against a repository holding a committed table
/// `t(pk int primary key, c int)`
pub fn run_table_repo_test<F>(test: F)
where
    F: FnOnce(&LocalRepository) -> Result<()>,
{
    run_empty_repo_test(|repo| {
        create_table(repo, "t")?;
        commit_all(repo, "create table t")?;
        test(repo)
    });
}

/// A directory suitable as a `file://` remote, pre-created as a bare store
pub fn new_remote() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().join("remote").display());
    crate::core::remote::create_remote(&url).unwrap();
    (dir, url)
}

/// Create table `name(pk int primary key, c int)` in the working root
pub fn create_table(repo: &LocalRepository, name: &str) -> Result<()> {
    let schema = Schema::new(
        vec![
            Column::new("pk", DataType::Int32, 1, false),
            Column::new("c", DataType::Int32, 2, true),
        ],
        vec!["pk".to_string()],
    );
    let store = repo.store();
    let mut ws = command::current_working_set(repo)?;
    let mut root = ws.working_root()?;
    let table = crate::core::table::Table::create(store.clone(), name, schema)?;
    root.put_table(&store, &table)?;
    ws.set_working_root(&root)?;
    ws.save()
}

/// Upsert (pk, c) into a table in the working root
pub fn set_row(repo: &LocalRepository, table: &str, pk: i64, c: i64) -> Result<()> {
    let store = repo.store();
    let mut ws = command::current_working_set(repo)?;
    let mut root = ws.working_root()?;
    let mut t = root.expect_table(&store, table)?;
    t.put_row(Tuple::from_fields(vec![
        (1, Value::Int(pk)),
        (2, Value::Int(c)),
    ]))?;
    root.put_table(&store, &t)?;
    ws.set_working_root(&root)?;
    ws.save()
}

pub fn delete_row(repo: &LocalRepository, table: &str, pk: i64) -> Result<()> {
    let store = repo.store();
    let mut ws = command::current_working_set(repo)?;
    let mut root = ws.working_root()?;
    let mut t = root.expect_table(&store, table)?;
    t.delete_row(&[Value::Int(pk)])?;
    root.put_table(&store, &t)?;
    ws.set_working_root(&root)?;
    ws.save()
}

/// Read column c for a primary key from the working root
pub fn get_c(repo: &LocalRepository, table: &str, pk: i64) -> Result<Option<i64>> {
    let store = repo.store();
    let ws = command::current_working_set(repo)?;
    let root = ws.working_root()?;
    let t = root.expect_table(&store, table)?;
    Ok(t.get_row(&[Value::Int(pk)])?.and_then(|row| match row.get(2) {
        Some(Value::Int(c)) => Some(*c),
        _ => None,
    }))
}

/// Stage everything and commit it
pub fn commit_all(repo: &LocalRepository, message: &str) -> Result<Commit> {
    command::add::add_all(repo)?;
    let commit = command::commit::commit(
        repo,
        &CommitOpts {
            message: message.to_string(),
            ..Default::default()
        },
    )?;
    commit.ok_or_else(|| crate::error::DoltError::Internal("expected a commit".to_string()))
}
