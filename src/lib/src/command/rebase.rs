//! The rebase driver. Work happens on a working branch named
//! `dolt_rebase_<target>`: HEAD moves there, the plan executes commit by
//! commit, and pauses (conflicts, `edit` entries) simply persist the state
//! in that branch's working set. `continue` resumes the loop; `abort`
//! restores HEAD and drops the working branch; finishing retargets the
//! original branch and cleans up.

use crate::command;
use crate::constants::REBASE_BRANCH_PREFIX;
use crate::core::index::refs::{branch_ref, working_set_ref, RefWriter};
use crate::core::index::{revisions, CommitReader, CommitWriter, WorkingSet};
use crate::core::rebase::{
    default_plan, replay_commit, squash_message, PauseKind, RebaseAction, RebaseState,
    ReplayOutcome,
};
use crate::core::root::RootValue;
use crate::error::{DoltError, Result};
use crate::model::{Commit, Hash, LocalRepository, Signature};
use crate::opts::RebaseOpts;
use crate::util::cancel::CancelToken;

#[derive(Debug, Clone)]
pub enum RebaseOutcome {
    Completed(Commit),
    Paused {
        kind: PauseKind,
        conflicted_tables: Vec<String>,
    },
}

pub fn rebase(repo: &LocalRepository, opts: &RebaseOpts) -> Result<RebaseOutcome> {
    let store = repo.store();
    let branch = repo.current_branch()?;
    if branch.starts_with(REBASE_BRANCH_PREFIX) {
        return Err(DoltError::InvalidArgument(
            "a rebase is already in progress; use continue or abort".to_string(),
        ));
    }
    let ws = command::current_working_set(repo)?;
    let head = CommitReader::new(store.clone()).get_commit(&ws.data.head)?;
    if ws.data.working != head.root || ws.data.merge_state.is_some() {
        return Err(DoltError::DirtyWorkingSet("rebase".to_string()));
    }

    let upstream = revisions::resolve_commit(&store, Some(&branch), &opts.upstream)?;
    let reader = CommitReader::new(store.clone());
    let plan = match &opts.plan {
        Some(plan) => plan.clone(),
        None => default_plan(&reader, &upstream.id, &head.id)?,
    };
    if plan.is_empty() {
        // Nothing to replay: the branch simply moves onto the upstream
        let mut ws = ws;
        ws.reset_hard(upstream.id, upstream.root);
        let ws_hash = store.put(&serde_json::to_vec(&ws.data)?)?;
        RefWriter::new(store.clone()).update(|map| {
            map.insert(branch_ref(&branch), upstream.id);
            map.insert(working_set_ref(&branch), ws_hash);
            Ok(())
        })?;
        return Ok(RebaseOutcome::Completed(upstream));
    }

    let working_branch = format!("{REBASE_BRANCH_PREFIX}{branch}");
    RefWriter::new(store.clone()).create_branch(&working_branch, upstream.id)?;
    let mut work_ws = WorkingSet::create(
        store.clone(),
        &working_branch,
        upstream.id,
        upstream.root,
    )?;
    work_ws.data.rebase_state = Some(RebaseState {
        original_head: head.id,
        onto: upstream.id,
        target_branch: branch.clone(),
        working_branch: working_branch.clone(),
        plan,
        plan_index: 0,
        output_head: upstream.id,
        paused: None,
        empty_policy: opts.empty_policy,
    });
    work_ws.save()?;
    repo.set_current_branch(&working_branch)?;

    run_loop(repo)
}

pub fn continue_rebase(repo: &LocalRepository) -> Result<RebaseOutcome> {
    let store = repo.store();
    let mut ws = command::current_working_set(repo)?;
    let Some(mut state) = ws.data.rebase_state.clone() else {
        return Err(DoltError::NotFound("rebase in progress".to_string()));
    };
    match state.paused {
        Some(PauseKind::Conflict) => {
            let staged = ws.staged_root()?;
            let mut unresolved = Vec::new();
            for name in staged.table_names() {
                if staged.expect_table(&store, &name)?.has_conflicts() {
                    unresolved.push(name);
                }
            }
            if !unresolved.is_empty() {
                return Err(DoltError::MergeConflict(unresolved.len()));
            }
            let entry = state.plan[state.plan_index].clone();
            let commit = create_rebase_commit(
                repo,
                &ws.data.staged,
                vec![state.output_head],
                &entry.message,
            )?;
            state.output_head = commit.id;
            state.plan_index += 1;
            state.paused = None;
            let staged = ws.data.staged;
            advance_working_branch(&store, &mut ws, &state, commit.id, staged)?;
        }
        Some(PauseKind::Edit) => {
            // The user may have amended or added commits; resume from the
            // working branch head
            state.output_head = ws.data.head;
            state.paused = None;
            ws.data.rebase_state = Some(state);
            ws.save()?;
        }
        None => {}
    }
    run_loop(repo)
}

pub fn abort(repo: &LocalRepository) -> Result<()> {
    let ws = command::current_working_set(repo)?;
    let Some(state) = ws.data.rebase_state.clone() else {
        return Err(DoltError::NotFound("rebase in progress".to_string()));
    };
    restore_original(repo, &state)?;
    Ok(())
}

fn restore_original(repo: &LocalRepository, state: &RebaseState) -> Result<()> {
    let store = repo.store();
    repo.set_current_branch(&state.target_branch)?;
    RefWriter::new(store).delete_branch(&state.working_branch)?;
    log::debug!(
        "rebase aborted; {} restored to {}",
        state.target_branch,
        state.original_head
    );
    Ok(())
}

fn run_loop(repo: &LocalRepository) -> Result<RebaseOutcome> {
    let store = repo.store();
    let cancel = CancelToken::new();
    let reader = CommitReader::new(store.clone());

    loop {
        let mut ws = command::current_working_set(repo)?;
        let Some(mut state) = ws.data.rebase_state.clone() else {
            return Err(DoltError::NotFound("rebase in progress".to_string()));
        };
        if state.plan_index >= state.plan.len() {
            return finish(repo, &state);
        }
        let entry = state.plan[state.plan_index].clone();
        if entry.action == RebaseAction::Drop {
            state.plan_index += 1;
            ws.data.rebase_state = Some(state);
            ws.save()?;
            continue;
        }

        let source = reader.get_commit(&entry.commit)?;
        let output_commit = reader.get_commit(&state.output_head)?;
        let output_root = RootValue::read(&store, &output_commit.root)?;

        match replay_commit(&store, &source, &output_root, &cancel)? {
            ReplayOutcome::SchemaConflict(tables) => {
                // Schema conflicts during rebase are non-recoverable
                restore_original(repo, &state)?;
                return Err(DoltError::SchemaConflict(tables.join(", ")));
            }
            ReplayOutcome::Conflicted(root, stats) => {
                let root_hash = root.write(&store)?;
                ws.data.working = root_hash;
                ws.data.staged = root_hash;
                state.paused = Some(PauseKind::Conflict);
                ws.data.rebase_state = Some(state);
                ws.save()?;
                return Ok(RebaseOutcome::Paused {
                    kind: PauseKind::Conflict,
                    conflicted_tables: stats.conflicted_tables,
                });
            }
            ReplayOutcome::Empty => match state.empty_policy {
                crate::core::rebase::EmptyCommitPolicy::Drop => {
                    log::debug!("dropping empty pick {}", source.id);
                    state.plan_index += 1;
                    ws.data.rebase_state = Some(state);
                    ws.save()?;
                    continue;
                }
                crate::core::rebase::EmptyCommitPolicy::Keep => {
                    let commit =
                        apply_entry(repo, &entry, &output_commit, output_commit.root)?;
                    state.output_head = commit.id;
                    state.plan_index += 1;
                    let paused_for_edit = entry.action == RebaseAction::Edit;
                    if paused_for_edit {
                        state.paused = Some(PauseKind::Edit);
                    }
                    advance_working_branch(&store, &mut ws, &state, commit.id, commit.root)?;
                    if paused_for_edit {
                        return Ok(RebaseOutcome::Paused {
                            kind: PauseKind::Edit,
                            conflicted_tables: vec![],
                        });
                    }
                    continue;
                }
                crate::core::rebase::EmptyCommitPolicy::Error => {
                    restore_original(repo, &state)?;
                    return Err(DoltError::InvalidArgument(format!(
                        "commit {} produced an empty change set",
                        source.id.short()
                    )));
                }
            },
            ReplayOutcome::Clean(root) => {
                let root_hash = root.write(&store)?;
                let commit = apply_entry(repo, &entry, &output_commit, root_hash)?;
                state.output_head = commit.id;
                state.plan_index += 1;
                let paused_for_edit = entry.action == RebaseAction::Edit;
                if paused_for_edit {
                    state.paused = Some(PauseKind::Edit);
                }
                advance_working_branch(&store, &mut ws, &state, commit.id, root_hash)?;
                if paused_for_edit {
                    return Ok(RebaseOutcome::Paused {
                        kind: PauseKind::Edit,
                        conflicted_tables: vec![],
                    });
                }
            }
        }
    }
}

/// Build the output commit for one plan entry. Squash and fixup fold into
/// the previous output commit instead of chaining onto it.
fn apply_entry(
    repo: &LocalRepository,
    entry: &crate::core::rebase::PlanEntry,
    output_commit: &Commit,
    root: Hash,
) -> Result<Commit> {
    let (parents, message) = match entry.action {
        RebaseAction::Squash | RebaseAction::Fixup => (
            output_commit.parent_ids.clone(),
            squash_message(&output_commit.message, &entry.message, entry.action),
        ),
        _ => (vec![output_commit.id], entry.message.clone()),
    };
    create_rebase_commit(repo, &root, parents, &message)
}

fn create_rebase_commit(
    repo: &LocalRepository,
    root: &Hash,
    parents: Vec<Hash>,
    message: &str,
) -> Result<Commit> {
    let config = repo.config()?;
    let (name, email) = config.user_identity()?;
    let sig: Signature = crate::core::index::commit_writer::signature(
        name,
        email,
        command::commit::author_date()?,
    );
    CommitWriter::new(repo.store()).create_commit(*root, parents, sig.clone(), sig, message)
}

fn advance_working_branch(
    store: &crate::core::db::StoreRef,
    ws: &mut WorkingSet,
    state: &RebaseState,
    head: Hash,
    root: Hash,
) -> Result<()> {
    ws.data.head = head;
    ws.data.working = root;
    ws.data.staged = root;
    ws.data.rebase_state = Some(state.clone());
    let ws_hash = store.put(&serde_json::to_vec(&ws.data)?)?;
    let branch = state.working_branch.clone();
    RefWriter::new(store.clone()).update(|map| {
        map.insert(branch_ref(&branch), head);
        map.insert(working_set_ref(&branch), ws_hash);
        Ok(())
    })?;
    Ok(())
}

fn finish(repo: &LocalRepository, state: &RebaseState) -> Result<RebaseOutcome> {
    let store = repo.store();
    let reader = CommitReader::new(store.clone());
    let new_head = reader.get_commit(&state.output_head)?;

    let mut target_ws = WorkingSet::load(store.clone(), &state.target_branch)?;
    target_ws.reset_hard(new_head.id, new_head.root);
    target_ws.data.rebase_state = None;
    let ws_hash = store.put(&serde_json::to_vec(&target_ws.data)?)?;
    let target = state.target_branch.clone();
    RefWriter::new(store.clone()).update(|map| {
        map.insert(branch_ref(&target), new_head.id);
        map.insert(working_set_ref(&target), ws_hash);
        Ok(())
    })?;
    repo.set_current_branch(&state.target_branch)?;
    RefWriter::new(store).delete_branch(&state.working_branch)?;
    log::debug!(
        "rebase finished; {} now at {}",
        state.target_branch,
        new_head.id
    );
    Ok(RebaseOutcome::Completed(new_head))
}
