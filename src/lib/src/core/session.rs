//! Sessions and transactions: the seam the SQL layer drives. A session
//! pins a database and branch, owns an optional open transaction against a
//! snapshot of the branch working set, and exposes the administrative
//! procedures and history views. Transaction commit is optimistic: CAS the
//! working-set pointer, and on a lost race three-way-merge against the
//! observed working root before retrying.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::command;
use crate::core::db::StoreRef;
use crate::core::index::working_set::WorkingSetData;
use crate::core::index::{revisions, CommitReader, WorkingSet};
use crate::core::merge::Merger;
use crate::core::root::RootValue;
use crate::core::table::{constraints, Table};
use crate::core::value::Tuple;
use crate::error::{DoltError, Result};
use crate::model::schema::{allocate_tag, Column, DataType, Schema};
use crate::model::{Commit, Hash, LocalRepository, StagedData};
use crate::opts;
use crate::util::cancel::CancelToken;

/// Single-row result every dolt procedure returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureResult {
    pub status: i32,
    pub message: String,
}

impl ProcedureResult {
    fn ok(message: impl Into<String>) -> ProcedureResult {
        ProcedureResult {
            status: 0,
            message: message.into(),
        }
    }
}

struct Transaction {
    start_head: Hash,
    start_working_set: WorkingSetData,
    dirty_working: Hash,
}

pub struct Session {
    repo: LocalRepository,
    pub database: String,
    pub branch: String,
    pub autocommit: bool,
    pub foreign_key_checks: bool,
    pub variables: BTreeMap<String, String>,
    txn: Option<Transaction>,
    cancel: CancelToken,
}

impl Session {
    pub fn new(repo: LocalRepository) -> Result<Session> {
        let branch = repo.current_branch()?;
        let database = repo
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "dolt".to_string());
        Ok(Session {
            repo,
            database,
            branch,
            autocommit: true,
            foreign_key_checks: true,
            variables: BTreeMap::new(),
            txn: None,
            cancel: CancelToken::new(),
        })
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn store(&self) -> StoreRef {
        self.repo.store()
    }

    fn working_set(&self) -> Result<WorkingSet> {
        WorkingSet::load(self.store(), &self.branch)
    }

    /// Switch this session to another branch; any open transaction rolls
    /// back
    pub fn use_branch(&mut self, branch: &str) -> Result<()> {
        self.txn = None;
        WorkingSet::load(self.store(), branch)?;
        self.branch = branch.to_string();
        Ok(())
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.txn.is_some() {
            return Ok(());
        }
        let ws = self.working_set()?;
        self.txn = Some(Transaction {
            start_head: ws.data.head,
            start_working_set: ws.data.clone(),
            dirty_working: ws.data.working,
        });
        Ok(())
    }

    pub fn rollback(&mut self) {
        self.txn = None;
    }

    /// The root this session currently reads and writes
    pub fn working_root(&self) -> Result<RootValue> {
        match &self.txn {
            Some(txn) => RootValue::read(&self.store(), &txn.dirty_working),
            None => self.working_set()?.working_root(),
        }
    }

    fn write_working_root(&mut self, root: &RootValue) -> Result<()> {
        let hash = root.write(&self.store())?;
        let txn = self
            .txn
            .as_mut()
            .ok_or_else(|| DoltError::Internal("no open transaction".to_string()))?;
        txn.dirty_working = hash;
        Ok(())
    }

    /// Statement-level mutation: open a transaction if none, mutate the
    /// dirty root, and auto-commit when autocommit is on.
    fn mutate<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Session, &mut RootValue) -> Result<()>,
    {
        self.begin_transaction()?;
        let mut root = self.working_root()?;
        f(self, &mut root)?;
        self.write_working_root(&root)?;
        if self.autocommit {
            self.commit_transaction()?;
        }
        Ok(())
    }

    pub fn insert_row(&mut self, table: &str, row: Tuple) -> Result<()> {
        let fk_checks = self.foreign_key_checks;
        self.mutate(|session, root| {
            let store = session.store();
            let mut t = root.expect_table(&store, table)?;
            t.insert_row(row.clone())?;
            if fk_checks {
                for fk in root.foreign_keys_for_child(table) {
                    if let Some(v) = constraints::check_foreign_key(root, &store, fk, &t, &row)? {
                        return Err(DoltError::ConstraintViolation(v.details));
                    }
                }
            }
            root.put_table(&store, &t)?;
            Ok(())
        })
    }

    pub fn update_row(&mut self, table: &str, row: Tuple) -> Result<()> {
        let fk_checks = self.foreign_key_checks;
        self.mutate(|session, root| {
            let store = session.store();
            let mut t = root.expect_table(&store, table)?;
            t.put_row(row.clone())?;
            if fk_checks {
                for fk in root.foreign_keys_for_child(table) {
                    if let Some(v) = constraints::check_foreign_key(root, &store, fk, &t, &row)? {
                        return Err(DoltError::ConstraintViolation(v.details));
                    }
                }
            }
            root.put_table(&store, &t)?;
            Ok(())
        })
    }

    pub fn delete_row(&mut self, table: &str, pk: &[crate::core::value::Value]) -> Result<()> {
        self.mutate(|session, root| {
            let store = session.store();
            let mut t = root.expect_table(&store, table)?;
            t.delete_row(pk)?;
            root.put_table(&store, &t)?;
            Ok(())
        })
    }

    /// DDL: create a table, allocating column tags that collide with no tag
    /// ever used for this table name in the branch's history
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<(String, DataType, bool)>,
        primary_key: Vec<String>,
    ) -> Result<()> {
        let used = self.historic_tags(name)?;
        self.mutate(|session, root| {
            if root.has_table(name) {
                return Err(DoltError::AlreadyExists(format!("table {name}")));
            }
            let store = session.store();
            let mut used = used.clone();
            let mut cols = Vec::with_capacity(columns.len());
            for (col_name, dtype, nullable) in &columns {
                let tag = allocate_tag(name, col_name, dtype, &used);
                used.insert(tag);
                cols.push(Column::new(col_name, dtype.clone(), tag, *nullable));
            }
            let schema = Schema::new(cols, primary_key.clone());
            let table = Table::create(store.clone(), name, schema)?;
            root.put_table(&store, &table)?;
            Ok(())
        })
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.mutate(|_, root| root.remove_table(name))
    }

    /// DDL: add a column. Existing rows gain it by read-time defaulting;
    /// nothing is rewritten.
    pub fn add_column(
        &mut self,
        table: &str,
        column: &str,
        dtype: DataType,
        nullable: bool,
        default: Option<String>,
    ) -> Result<()> {
        let used = self.historic_tags(table)?;
        self.mutate(|session, root| {
            let store = session.store();
            let mut t = root.expect_table(&store, table)?;
            if t.schema.has_column(column) {
                return Err(DoltError::AlreadyExists(format!("column {column}")));
            }
            let mut schema = t.schema.clone();
            let tag = allocate_tag(table, column, &dtype, &used);
            let mut col = Column::new(column, dtype.clone(), tag, nullable);
            col.default = default.clone();
            schema.columns.push(col);
            t.set_schema(schema)?;
            root.put_table(&store, &t)?;
            Ok(())
        })
    }

    /// DDL: drop a column. The tag retires; row bytes keep it but readers
    /// ignore it.
    pub fn drop_column(&mut self, table: &str, column: &str) -> Result<()> {
        self.mutate(|session, root| {
            let store = session.store();
            let mut t = root.expect_table(&store, table)?;
            if t.schema.primary_key.iter().any(|c| c == column) {
                return Err(DoltError::InvalidArgument(format!(
                    "cannot drop primary key column {column}"
                )));
            }
            let mut schema = t.schema.clone();
            let before = schema.columns.len();
            schema.columns.retain(|c| c.name != column);
            if schema.columns.len() == before {
                return Err(DoltError::NotFound(format!("column {column}")));
            }
            t.set_schema(schema)?;
            root.put_table(&store, &t)?;
            Ok(())
        })
    }

    /// DDL: rename a column. The tag is unchanged, so no data moves.
    pub fn rename_column(&mut self, table: &str, from: &str, to: &str) -> Result<()> {
        self.mutate(|session, root| {
            let store = session.store();
            let mut t = root.expect_table(&store, table)?;
            if t.schema.has_column(to) {
                return Err(DoltError::AlreadyExists(format!("column {to}")));
            }
            let mut schema = t.schema.clone();
            let col = schema
                .columns
                .iter_mut()
                .find(|c| c.name == from)
                .ok_or_else(|| DoltError::NotFound(format!("column {from}")))?;
            col.name = to.to_string();
            for pk in schema.primary_key.iter_mut() {
                if pk == from {
                    *pk = to.to_string();
                }
            }
            t.set_schema(schema)?;
            root.put_table(&store, &t)?;
            Ok(())
        })
    }

    /// DDL: change a column's type; widening is schema-only
    pub fn change_column_type(
        &mut self,
        table: &str,
        column: &str,
        dtype: DataType,
    ) -> Result<()> {
        self.mutate(|session, root| {
            let store = session.store();
            let mut t = root.expect_table(&store, table)?;
            t.change_column_type(column, dtype.clone())?;
            root.put_table(&store, &t)?;
            Ok(())
        })
    }

    /// The `dolt_history_<table>` view: this primary key's value at every
    /// commit in HEAD's history, newest first
    pub fn table_history(
        &self,
        table: &str,
        pk: &[crate::core::value::Value],
    ) -> Result<Vec<(Commit, Option<Tuple>)>> {
        let store = self.store();
        let ws = self.working_set()?;
        let reader = CommitReader::new(store.clone());
        let history = reader.history_from(&ws.data.head)?;
        let mut out = Vec::with_capacity(history.commits.len());
        for commit in history.commits {
            let root = RootValue::read(&store, &commit.root)?;
            let row = match root.get_table(&store, table)? {
                Some(t) => t.get_row(pk)?,
                None => None,
            };
            out.push((commit, row));
        }
        Ok(out)
    }

    /// Every tag any schema of this table name ever used on this branch,
    /// including the uncommitted working root
    fn historic_tags(&self, table: &str) -> Result<HashSet<u64>> {
        let store = self.store();
        let ws = self.working_set()?;
        let reader = CommitReader::new(store.clone());
        let history = reader.history_from(&ws.data.head)?;
        let mut tags = HashSet::new();
        if let Some(t) = self.working_root()?.get_table(&store, table)? {
            tags.extend(t.schema.tags());
        }
        for commit in &history.commits {
            let root = RootValue::read(&store, &commit.root)?;
            if let Some(t) = root.get_table(&store, table)? {
                tags.extend(t.schema.tags());
            }
        }
        Ok(tags)
    }

    /// SQL COMMIT. CAS the working-set pointer; on a lost race, three-way
    /// merge the dirty root against the observed working root and retry.
    pub fn commit_transaction(&mut self) -> Result<()> {
        let Some(txn) = self.txn.take() else {
            return Ok(());
        };
        if !self.foreign_key_checks {
            self.validate_deferred_foreign_keys(&txn)?;
        }
        let store = self.store();
        let observed = self.working_set()?;

        if observed.data == txn.start_working_set {
            let mut updated = observed.clone();
            updated.data.working = txn.dirty_working;
            if updated.save_if_unchanged(&txn.start_working_set)? {
                return Ok(());
            }
        }

        // Optimistic concurrency: merge our edits onto the observed root
        let observed = self.working_set()?;
        if observed.data.head != txn.start_head {
            return Err(DoltError::DirtyWorkingSet(
                "transaction conflict: branch head moved".to_string(),
            ));
        }
        let base = RootValue::read(&store, &txn.start_working_set.working)?;
        let ours = observed.working_root()?;
        let theirs = RootValue::read(&store, &txn.dirty_working)?;
        let merger = Merger::new(store.clone(), self.cancel.clone());
        let (merged, stats) = merger.merge_roots(&base, &ours, &theirs)?;
        if !stats.is_clean() {
            return Err(DoltError::DirtyWorkingSet(
                "transaction conflict: concurrent modification".to_string(),
            ));
        }
        let merged_hash = merged.write(&store)?;
        let mut updated = observed.clone();
        updated.data.working = merged_hash;
        if updated.save_if_unchanged(&observed.data)? {
            return Ok(());
        }
        Err(DoltError::DirtyWorkingSet(
            "transaction conflict: working set moved during merge".to_string(),
        ))
    }

    fn validate_deferred_foreign_keys(&self, txn: &Transaction) -> Result<()> {
        let store = self.store();
        let root = RootValue::read(&store, &txn.dirty_working)?;
        for fk in root.foreign_keys.clone() {
            let child = root.expect_table(&store, &fk.child_table)?;
            for (_, value_bytes) in child.primary_tree().entries()? {
                let row = crate::core::value::codec::decode_tuple(&value_bytes)?;
                if let Some(v) = constraints::check_foreign_key(&root, &store, &fk, &child, &row)? {
                    return Err(DoltError::ConstraintViolation(v.details));
                }
            }
        }
        Ok(())
    }

    /// `AS OF <revision>` root resolution. `STAGED` and `WORKING` read the
    /// working set; anything else resolves through the commit graph, so a
    /// revision past a ghost surfaces `ShallowBoundary`.
    pub fn root_as_of(&self, revision: &str) -> Result<RootValue> {
        let store = self.store();
        match revision {
            "WORKING" => self.working_root(),
            "STAGED" => self.working_set()?.staged_root(),
            rev => {
                let commit = revisions::resolve_commit(&store, Some(&self.branch), rev)?;
                RootValue::read(&store, &commit.root)
            }
        }
    }

    /// Read a column of one row at a revision; the time-travel read path
    pub fn read_row_as_of(
        &self,
        table: &str,
        pk: &[crate::core::value::Value],
        revision: &str,
    ) -> Result<Option<Tuple>> {
        let root = self.root_as_of(revision)?;
        let Some(t) = root.get_table(&self.store(), table)? else {
            return Err(DoltError::table_not_found(table));
        };
        t.get_row(pk)
    }

    // --- history views backing the dolt_* system tables ---

    pub fn dolt_log(&self) -> Result<Vec<Commit>> {
        Ok(command::log::log(&self.repo, &opts::LogOpts::default())?.commits)
    }

    pub fn dolt_branches(&self) -> Result<Vec<crate::model::Branch>> {
        command::branch::list(&self.repo)
    }

    pub fn dolt_tags(&self) -> Result<Vec<(String, Commit)>> {
        command::tag::list(&self.repo)
    }

    pub fn dolt_remotes(&self) -> Result<Vec<crate::model::Remote>> {
        self.repo.remotes()
    }

    pub fn dolt_status(&self) -> Result<StagedData> {
        command::status(&self.repo)
    }

    /// (table, unresolved conflict count) pairs
    pub fn dolt_conflicts(&self) -> Result<Vec<(String, usize)>> {
        let store = self.store();
        let root = self.working_root()?;
        let mut out = Vec::new();
        for name in root.table_names() {
            let table = root.expect_table(&store, &name)?;
            let count = table.list_conflicts()?.len();
            if count > 0 {
                out.push((name, count));
            }
        }
        Ok(out)
    }

    /// (table, violation count) pairs
    pub fn dolt_constraint_violations(&self) -> Result<Vec<(String, usize)>> {
        let store = self.store();
        let root = self.working_root()?;
        let mut out = Vec::new();
        for name in root.table_names() {
            let table = root.expect_table(&store, &name)?;
            let count = table.list_violations()?.len();
            if count > 0 {
                out.push((name, count));
            }
        }
        Ok(out)
    }

    /// Dispatch a `dolt_*` stored procedure. Contracts are identical to the
    /// CLI verbs; every call returns a single status row.
    pub fn call_procedure(&mut self, name: &str, args: &[String]) -> Result<ProcedureResult> {
        let repo = self.repo.clone();
        let result = match name {
            "dolt_add" => {
                if args.iter().any(|a| a == "-A" || a == ".") {
                    command::add::add_all(&repo)?;
                } else {
                    command::add::add(&repo, args)?;
                }
                ProcedureResult::ok("")
            }
            "dolt_commit" => {
                let opts = parse_commit_args(args)?;
                match command::commit::commit(&repo, &opts)? {
                    Some(commit) => ProcedureResult::ok(commit.id.to_hex()),
                    None => ProcedureResult::ok("skipped empty commit"),
                }
            }
            "dolt_checkout" => {
                let create = args.iter().any(|a| a == "-b");
                let branch = args
                    .iter()
                    .find(|a| !a.starts_with('-'))
                    .ok_or_else(|| DoltError::InvalidArgument("branch required".to_string()))?;
                command::checkout::checkout(&repo, branch, create)?;
                self.branch = branch.clone();
                ProcedureResult::ok(format!("Switched to branch '{branch}'"))
            }
            "dolt_branch" => {
                match args {
                    [name] => {
                        command::branch::create(&repo, name, None)?;
                    }
                    [flag, name] if flag == "-d" || flag == "-D" => {
                        command::branch::delete(&repo, name, flag == "-D")?;
                    }
                    [name, start] => {
                        command::branch::create(&repo, name, Some(start))?;
                    }
                    _ => {
                        return Err(DoltError::InvalidArgument(
                            "usage: dolt_branch([-d|-D,] name[, start])".to_string(),
                        ))
                    }
                }
                ProcedureResult::ok("")
            }
            "dolt_merge" => {
                let revision = args
                    .iter()
                    .find(|a| !a.starts_with('-'))
                    .ok_or_else(|| DoltError::InvalidArgument("revision required".to_string()))?;
                let merge_opts = opts::MergeOpts {
                    no_commit: args.iter().any(|a| a == "--no-commit"),
                    strategy: if args.iter().any(|a| a == "--squash") {
                        crate::core::merge::MergeStrategy::Squash
                    } else if args.iter().any(|a| a == "--no-ff") {
                        crate::core::merge::MergeStrategy::NoFf
                    } else {
                        crate::core::merge::MergeStrategy::ThreeWay
                    },
                    message: None,
                };
                match command::merge::merge(&repo, revision, &merge_opts)? {
                    command::merge::MergeOutcome::Conflicted {
                        conflicted_tables, ..
                    } => ProcedureResult {
                        status: 1,
                        message: format!("conflicts in: {}", conflicted_tables.join(", ")),
                    },
                    outcome => ProcedureResult::ok(format!("{outcome:?}")),
                }
            }
            "dolt_reset" => {
                let hard = args.iter().any(|a| a == "--hard");
                let revision = args.iter().find(|a| !a.starts_with('-')).cloned();
                command::reset::reset(&repo, &opts::ResetOpts { hard, revision })?;
                ProcedureResult::ok("")
            }
            "dolt_revert" => {
                let revision = args
                    .first()
                    .ok_or_else(|| DoltError::InvalidArgument("revision required".to_string()))?;
                let commit = command::revert::revert(&repo, revision)?;
                ProcedureResult::ok(commit.id.to_hex())
            }
            "dolt_cherry_pick" => {
                let revision = args
                    .first()
                    .ok_or_else(|| DoltError::InvalidArgument("revision required".to_string()))?;
                match command::cherry_pick::cherry_pick(&repo, revision)? {
                    command::merge::MergeOutcome::Merged(c) => ProcedureResult::ok(c.id.to_hex()),
                    outcome => ProcedureResult {
                        status: 1,
                        message: format!("{outcome:?}"),
                    },
                }
            }
            "dolt_rebase" => match args {
                [flag] if flag == "--continue" => {
                    let outcome = command::rebase::continue_rebase(&repo)?;
                    ProcedureResult::ok(format!("{outcome:?}"))
                }
                [flag] if flag == "--abort" => {
                    command::rebase::abort(&repo)?;
                    ProcedureResult::ok("rebase aborted")
                }
                [upstream] | [_, upstream] => {
                    let outcome = command::rebase::rebase(
                        &repo,
                        &opts::RebaseOpts {
                            upstream: upstream.clone(),
                            ..Default::default()
                        },
                    )?;
                    self.branch = repo.current_branch()?;
                    ProcedureResult::ok(format!("{outcome:?}"))
                }
                _ => {
                    return Err(DoltError::InvalidArgument(
                        "usage: dolt_rebase(upstream | --continue | --abort)".to_string(),
                    ))
                }
            },
            "dolt_tag" => {
                match args {
                    [name] => command::tag::create(&repo, name, None, None)?,
                    [flag, name] if flag == "-d" => command::tag::delete(&repo, name)?,
                    [name, revision] => command::tag::create(&repo, name, Some(revision), None)?,
                    _ => {
                        return Err(DoltError::InvalidArgument(
                            "usage: dolt_tag([-d,] name[, revision])".to_string(),
                        ))
                    }
                }
                ProcedureResult::ok("")
            }
            "dolt_push" => {
                let push_opts = opts::PushOpts {
                    force: args.iter().any(|a| a == "-f" || a == "--force"),
                    remote: positional(args, 0),
                    branch: positional(args, 1),
                };
                command::push::push(&repo, &push_opts)?;
                ProcedureResult::ok("")
            }
            "dolt_pull" => {
                let outcome = command::pull::pull(
                    &repo,
                    &opts::PullOpts {
                        remote: positional(args, 0),
                    },
                )?;
                ProcedureResult::ok(format!("{outcome:?}"))
            }
            "dolt_fetch" => {
                command::fetch::fetch(
                    &repo,
                    &opts::FetchOpts {
                        remote: positional(args, 0),
                    },
                )?;
                ProcedureResult::ok("")
            }
            "dolt_clone" => {
                let url = args
                    .first()
                    .ok_or_else(|| DoltError::InvalidArgument("url required".to_string()))?;
                let dir = args
                    .get(1)
                    .cloned()
                    .ok_or_else(|| DoltError::InvalidArgument("directory required".to_string()))?;
                command::clone::clone(
                    &opts::CloneOpts {
                        url: url.clone(),
                        branch: None,
                        depth: None,
                        remote_name: crate::constants::DEFAULT_REMOTE_NAME.to_string(),
                    },
                    Path::new(&dir),
                )?;
                ProcedureResult::ok("")
            }
            "dolt_gc" => {
                let stats = command::gc::gc(&repo)?;
                ProcedureResult::ok(format!("collected {} chunks", stats.collected))
            }
            "dolt_patch" => {
                let statements = command::diff::patch(&repo, &opts::DiffOpts::default())?;
                ProcedureResult::ok(statements.join("\n"))
            }
            other => {
                return Err(DoltError::NotFound(format!("procedure {other}")));
            }
        };
        Ok(result)
    }
}

fn positional(args: &[String], index: usize) -> Option<String> {
    args.iter().filter(|a| !a.starts_with('-')).nth(index).cloned()
}

fn parse_commit_args(args: &[String]) -> Result<opts::CommitOpts> {
    let mut commit_opts = opts::CommitOpts::default();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-m" | "--message" => {
                commit_opts.message = iter
                    .next()
                    .ok_or_else(|| DoltError::InvalidArgument("-m needs a message".to_string()))?
                    .clone();
            }
            "-a" | "--all" => commit_opts.all = true,
            "-A" | "--ALL" => commit_opts.all_new = true,
            "--amend" => commit_opts.amend = true,
            "--allow-empty" => commit_opts.allow_empty = true,
            "--skip-empty" => commit_opts.skip_empty = true,
            "-f" | "--force" => commit_opts.force = true,
            other => {
                return Err(DoltError::InvalidArgument(format!(
                    "unknown dolt_commit argument {other}"
                )))
            }
        }
    }
    Ok(commit_opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Value;
    use crate::test;

    fn int_row(pk: i64, c: i64) -> Tuple {
        Tuple::from_fields(vec![(1, Value::Int(pk)), (2, Value::Int(c))])
    }

    #[test]
    fn test_autocommit_insert_and_procedures() {
        test::run_table_repo_test(|repo| {
            let mut session = Session::new(repo.clone())?;
            session.insert_row("t", int_row(1, 1))?;

            session.call_procedure("dolt_add", &["-A".to_string()])?;
            let result = session.call_procedure(
                "dolt_commit",
                &["-m".to_string(), "from procedure".to_string()],
            )?;
            assert_eq!(result.status, 0);
            assert_eq!(command::head_commit(repo)?.message, "from procedure");
            Ok(())
        });
    }

    #[test]
    fn test_explicit_transaction_rollback() {
        test::run_table_repo_test(|repo| {
            let mut session = Session::new(repo.clone())?;
            session.autocommit = false;
            session.begin_transaction()?;
            session.insert_row("t", int_row(1, 1))?;
            session.rollback();
            assert_eq!(test::get_c(repo, "t", 1)?, None);
            Ok(())
        });
    }

    #[test]
    fn test_concurrent_disjoint_transactions_merge() {
        test::run_table_repo_test(|repo| {
            let mut a = Session::new(repo.clone())?;
            let mut b = Session::new(repo.clone())?;
            a.autocommit = false;
            b.autocommit = false;

            a.begin_transaction()?;
            b.begin_transaction()?;
            a.insert_row("t", int_row(1, 1))?;
            b.insert_row("t", int_row(2, 2))?;

            a.commit_transaction()?;
            // B lost the CAS; its commit goes through the optimistic merge
            b.commit_transaction()?;

            assert_eq!(test::get_c(repo, "t", 1)?, Some(1));
            assert_eq!(test::get_c(repo, "t", 2)?, Some(2));
            Ok(())
        });
    }

    #[test]
    fn test_concurrent_conflicting_transactions_fail() {
        test::run_table_repo_test(|repo| {
            test::set_row(repo, "t", 1, 0)?;
            test::commit_all(repo, "seed")?;

            let mut a = Session::new(repo.clone())?;
            let mut b = Session::new(repo.clone())?;
            a.autocommit = false;
            b.autocommit = false;
            a.begin_transaction()?;
            b.begin_transaction()?;
            a.update_row("t", int_row(1, 10))?;
            b.update_row("t", int_row(1, 20))?;

            a.commit_transaction()?;
            assert!(matches!(
                b.commit_transaction(),
                Err(DoltError::DirtyWorkingSet(_))
            ));
            assert_eq!(test::get_c(repo, "t", 1)?, Some(10));
            Ok(())
        });
    }

    #[test]
    fn test_time_travel_reads() {
        test::run_table_repo_test(|repo| {
            let mut session = Session::new(repo.clone())?;
            session.insert_row("t", int_row(1, 1))?;
            session.call_procedure("dolt_add", &["-A".to_string()])?;
            session.call_procedure("dolt_commit", &["-m".to_string(), "c2".to_string()])?;

            // HEAD sees the row, HEAD~1 does not
            let now = session.read_row_as_of("t", &[Value::Int(1)], "HEAD")?;
            assert_eq!(now.unwrap().get(2), Some(&Value::Int(1)));
            let before = session.read_row_as_of("t", &[Value::Int(1)], "HEAD~1")?;
            assert!(before.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_create_table_never_reuses_historic_tags() {
        test::run_empty_repo_test(|repo| {
            let mut session = Session::new(repo.clone())?;
            session.create_table(
                "users",
                vec![
                    ("id".to_string(), DataType::Int64, false),
                    ("name".to_string(), DataType::Text, true),
                ],
                vec!["id".to_string()],
            )?;
            session.call_procedure("dolt_add", &["-A".to_string()])?;
            session.call_procedure("dolt_commit", &["-m".to_string(), "create".to_string()])?;
            let first_tags: HashSet<u64> = {
                let root = session.working_root()?;
                root.expect_table(&session.store(), "users")?.schema.tags()
            };

            session.drop_table("users")?;
            session.call_procedure("dolt_add", &["-A".to_string()])?;
            session.call_procedure("dolt_commit", &["-m".to_string(), "drop".to_string()])?;

            // Recreate with a different column type; tags must not repeat
            session.create_table(
                "users",
                vec![
                    ("id".to_string(), DataType::Text, false),
                    ("name".to_string(), DataType::Text, true),
                ],
                vec!["id".to_string()],
            )?;
            let second_tags: HashSet<u64> = {
                let root = session.working_root()?;
                root.expect_table(&session.store(), "users")?.schema.tags()
            };
            assert!(first_tags.is_disjoint(&second_tags));
            assert!(!second_tags.contains(&0));
            Ok(())
        });
    }

    #[test]
    fn test_column_ddl_round_trip() {
        test::run_table_repo_test(|repo| {
            let mut session = Session::new(repo.clone())?;
            session.insert_row("t", int_row(1, 1))?;

            session.add_column("t", "d", DataType::Int32, true, Some("7".to_string()))?;
            session.rename_column("t", "c", "c2")?;
            session.change_column_type("t", "c2", DataType::Int64)?;

            let root = session.working_root()?;
            let t = root.expect_table(&session.store(), "t")?;
            assert!(t.schema.has_column("c2"));
            assert!(!t.schema.has_column("c"));
            let row = t.get_row(&[Value::Int(1)])?.unwrap();
            // Renamed column kept its data; added column defaulted
            assert_eq!(row.get(2), Some(&Value::Int(1)));
            let d_tag = t.schema.get_column("d").unwrap().tag;
            assert_eq!(row.get(d_tag), Some(&Value::Int(7)));

            session.drop_column("t", "d")?;
            let root = session.working_root()?;
            let t = root.expect_table(&session.store(), "t")?;
            assert!(!t.schema.has_column("d"));
            Ok(())
        });
    }

    #[test]
    fn test_table_history_view() {
        test::run_table_repo_test(|repo| {
            let mut session = Session::new(repo.clone())?;
            session.insert_row("t", int_row(1, 1))?;
            session.call_procedure("dolt_add", &["-A".to_string()])?;
            session.call_procedure("dolt_commit", &["-m".to_string(), "v1".to_string()])?;
            session.update_row("t", int_row(1, 2))?;
            session.call_procedure("dolt_add", &["-A".to_string()])?;
            session.call_procedure("dolt_commit", &["-m".to_string(), "v2".to_string()])?;

            let history = session.table_history("t", &[Value::Int(1)])?;
            let values: Vec<Option<i64>> = history
                .iter()
                .map(|(_, row)| {
                    row.as_ref().and_then(|r| match r.get(2) {
                        Some(Value::Int(i)) => Some(*i),
                        _ => None,
                    })
                })
                .collect();
            // Newest first: 2, then 1, then absent before the insert
            assert_eq!(values[0], Some(2));
            assert_eq!(values[1], Some(1));
            assert!(values[2..].iter().all(|v| v.is_none()));
            Ok(())
        });
    }

    #[test]
    fn test_deferred_fk_checks_validate_at_commit() {
        test::run_empty_repo_test(|repo| {
            let mut session = Session::new(repo.clone())?;
            session.create_table(
                "parent",
                vec![("id".to_string(), DataType::Int64, false)],
                vec!["id".to_string()],
            )?;
            session.create_table(
                "child",
                vec![
                    ("id".to_string(), DataType::Int64, false),
                    ("parent_id".to_string(), DataType::Int64, true),
                ],
                vec!["id".to_string()],
            )?;
            // Wire the FK into the root
            {
                session.autocommit = true;
                session.begin_transaction()?;
                let mut root = session.working_root()?;
                root.foreign_keys.push(crate::model::schema::ForeignKey {
                    name: "fk_child_parent".to_string(),
                    child_table: "child".to_string(),
                    child_columns: vec!["parent_id".to_string()],
                    parent_table: "parent".to_string(),
                    parent_columns: vec!["id".to_string()],
                });
                session.write_working_root(&root)?;
                session.commit_transaction()?;
            }

            // With checks off the orphan insert is accepted...
            session.foreign_key_checks = false;
            session.autocommit = false;
            session.begin_transaction()?;
            let child_schema = {
                let root = session.working_root()?;
                root.expect_table(&session.store(), "child")?.schema.clone()
            };
            let id_tag = child_schema.get_column("id").unwrap().tag;
            let pid_tag = child_schema.get_column("parent_id").unwrap().tag;
            session.insert_row(
                "child",
                Tuple::from_fields(vec![(id_tag, Value::Int(1)), (pid_tag, Value::Int(42))]),
            )?;
            // ...but commit re-validates and rejects
            assert!(matches!(
                session.commit_transaction(),
                Err(DoltError::ConstraintViolation(_))
            ));
            Ok(())
        });
    }
}
