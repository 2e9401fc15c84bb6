//! Translate parsed arguments into libdolt command calls and render the
//! results. Every function returns the process exit code.

use clap::ArgMatches;
use comfy_table::Table;

use libdolt::command;
use libdolt::command::merge::MergeOutcome;
use libdolt::command::rebase::RebaseOutcome;
use libdolt::config::ConfigFile;
use libdolt::core::merge::MergeStrategy;
use libdolt::core::rebase::EmptyCommitPolicy;
use libdolt::error::DoltError;
use libdolt::opts::{
    CloneOpts, CommitOpts, DiffOpts, FetchOpts, LogOpts, MergeOpts, PullOpts, PushOpts,
    RebaseOpts, ResetOpts, ResolveChoice,
};

use crate::helpers::{self, fail, repo_from, run};

/// Spinner shown while a network-ish operation runs
fn spinner(message: &str) -> indicatif::ProgressBar {
    let bar = indicatif::ProgressBar::new_spinner();
    bar.set_message(message.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

pub fn init(_global: &ArgMatches, _sub: &ArgMatches) -> i32 {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => return fail(e.into()),
    };
    match command::init(&cwd) {
        Ok(repo) => {
            println!(
                "Successfully initialized dolt data repository on branch {}",
                repo.current_branch().unwrap_or_default()
            );
            0
        }
        Err(err) => fail(err),
    }
}

pub fn status(global: &ArgMatches, _sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    match command::status(&repo) {
        Ok(status) => {
            if status.merge_in_progress {
                println!("You have unmerged tables.");
            }
            if status.rebase_in_progress {
                println!("A rebase is in progress.");
            }
            if !status.staged_tables.is_empty() {
                println!("Changes to be committed:");
                for (name, state) in &status.staged_tables {
                    println!("  {state}: {name}");
                }
            }
            if !status.unstaged_tables.is_empty() {
                println!("Changes not staged for commit:");
                for (name, state) in &status.unstaged_tables {
                    println!("  {state}: {name}");
                }
            }
            if !status.conflicted_tables.is_empty() {
                println!("Unresolved conflicts:");
                for name in &status.conflicted_tables {
                    println!("  both modified: {name}");
                }
            }
            if !status.violated_tables.is_empty() {
                println!("Tables with constraint violations:");
                for name in &status.violated_tables {
                    println!("  violated: {name}");
                }
            }
            if status.is_clean() {
                println!("nothing to commit, working set clean");
            }
            0
        }
        Err(err) => fail(err),
    }
}

pub fn add(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let tables: Vec<String> = sub
        .get_many::<String>("tables")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    if sub.get_flag("all") || tables.iter().any(|t| t == ".") {
        run(command::add::add_all(&repo))
    } else {
        run(command::add::add(&repo, &tables))
    }
}

pub fn commit(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let mut opts = CommitOpts {
        message: sub
            .get_one::<String>("message")
            .cloned()
            .unwrap_or_default(),
        all: sub.get_flag("all"),
        all_new: sub.get_flag("ALL"),
        amend: sub.get_flag("amend"),
        allow_empty: sub.get_flag("allow-empty"),
        skip_empty: sub.get_flag("skip-empty"),
        force: sub.get_flag("force"),
        ..Default::default()
    };
    if let Some(author) = sub.get_one::<String>("author") {
        opts.author = match helpers::parse_author(author) {
            Ok(author) => Some(author),
            Err(e) => return fail(e),
        };
    }
    if let Some(date) = sub.get_one::<String>("date") {
        opts.date = match helpers::parse_date(date) {
            Ok(date) => Some(date),
            Err(e) => return fail(e),
        };
    }
    if let Some(date) = sub.get_one::<String>("committer-date") {
        opts.committer_date = match helpers::parse_date(date) {
            Ok(date) => Some(date),
            Err(e) => return fail(e),
        };
    }
    match command::commit::commit(&repo, &opts) {
        Ok(Some(commit)) => {
            println!("commit {}", commit.id);
            println!("Author: {}", commit.author);
            println!("\n    {}\n", commit.summary());
            0
        }
        Ok(None) => {
            println!("Skipped empty commit");
            0
        }
        Err(err) => fail(err),
    }
}

pub fn branch(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let name = sub.get_one::<String>("NAME");
    match name {
        None => match command::branch::list(&repo) {
            Ok(branches) => {
                let current = repo.current_branch().unwrap_or_default();
                for branch in branches {
                    let marker = if branch.name == current { "*" } else { " " };
                    println!("{marker} {}", branch.name);
                }
                0
            }
            Err(err) => fail(err),
        },
        Some(name) if sub.get_flag("delete") => {
            run(command::branch::delete(&repo, name, sub.get_flag("force")))
        }
        Some(name) => run(command::branch::create(
            &repo,
            name,
            sub.get_one::<String>("START").map(String::as_str),
        )
        .map(|_| ())),
    }
}

pub fn checkout(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let name = sub.get_one::<String>("NAME").expect("required");
    match command::checkout::checkout(&repo, name, sub.get_flag("branch")) {
        Ok(()) => {
            println!("Switched to branch '{name}'");
            0
        }
        Err(err) => fail(err),
    }
}

pub fn log(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let opts = LogOpts {
        revision: sub.get_one::<String>("REVISION").cloned(),
    };
    match command::log::log(&repo, &opts) {
        Ok(history) => {
            for commit in &history.commits {
                println!("commit {}", commit.id);
                println!("Author: {}", commit.author);
                println!("Date:   {}", commit.committer.timestamp.to_rfc2822());
                println!("\n    {}\n", commit.summary());
            }
            if let Some(boundary) = history.shallow_boundary {
                println!("... history truncated at {} (shallow clone)", boundary.short());
            }
            0
        }
        Err(err) => fail(err),
    }
}

pub fn diff(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let opts = DiffOpts {
        from_revision: sub.get_one::<String>("FROM").cloned(),
        to_revision: sub.get_one::<String>("TO").cloned(),
        tables: sub
            .get_one::<String>("tables")
            .map(|t| t.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
    };
    if sub.get_flag("patch") {
        return match command::diff::patch(&repo, &opts) {
            Ok(statements) => {
                for statement in statements {
                    println!("{statement}");
                }
                0
            }
            Err(err) => fail(err),
        };
    }
    match command::diff::diff(&repo, &opts) {
        Ok(summaries) => {
            let mut table = Table::new();
            table.set_header(vec!["table", "added", "removed", "modified", "schema"]);
            for summary in &summaries {
                table.add_row(vec![
                    summary.table.clone(),
                    summary.counts.added.to_string(),
                    summary.counts.removed.to_string(),
                    summary.counts.modified.to_string(),
                    if summary.schema_changed { "changed" } else { "" }.to_string(),
                ]);
            }
            if !summaries.is_empty() {
                println!("{table}");
            }
            0
        }
        Err(err) => fail(err),
    }
}

pub fn merge(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    if sub.get_flag("abort") {
        return run(command::merge::abort(&repo));
    }
    let Some(revision) = sub.get_one::<String>("REVISION") else {
        return fail(DoltError::InvalidArgument(
            "a branch or commit to merge is required".to_string(),
        ));
    };
    let opts = MergeOpts {
        strategy: if sub.get_flag("ff-only") {
            MergeStrategy::FfOnly
        } else if sub.get_flag("no-ff") {
            MergeStrategy::NoFf
        } else if sub.get_flag("squash") {
            MergeStrategy::Squash
        } else {
            MergeStrategy::ThreeWay
        },
        no_commit: sub.get_flag("no-commit"),
        message: sub.get_one::<String>("message").cloned(),
    };
    match command::merge::merge(&repo, revision, &opts) {
        Ok(MergeOutcome::UpToDate) => {
            println!("Already up to date.");
            0
        }
        Ok(MergeOutcome::FastForward(commit)) => {
            println!("Fast-forward to {}", commit.id);
            0
        }
        Ok(MergeOutcome::Merged(commit)) => {
            println!("Merge made commit {}", commit.id);
            0
        }
        Ok(MergeOutcome::Staged) => {
            println!("Merge staged; commit to conclude");
            0
        }
        Ok(MergeOutcome::Conflicted {
            conflicted_tables,
            violated_tables,
            schema_conflicts,
        }) => {
            for table in &conflicted_tables {
                eprintln!("CONFLICT (content): merge conflict in {table}");
            }
            for table in &violated_tables {
                eprintln!("CONSTRAINT VIOLATION (content): violations in {table}");
            }
            for table in &schema_conflicts {
                eprintln!("CONFLICT (schema): schemas differ for {table}");
            }
            eprintln!("Automatic merge failed; fix conflicts and then commit the result.");
            1
        }
        Err(err) => fail(err),
    }
}

pub fn conflicts(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    match sub.subcommand() {
        Some(("cat", args)) => {
            let table = args.get_one::<String>("TABLE").expect("required");
            match command::conflicts::list(&repo, table) {
                Ok(entries) => {
                    for entry in entries {
                        println!("base:   {:?}", entry.base);
                        println!("ours:   {:?}", entry.ours);
                        println!("theirs: {:?}", entry.theirs);
                        println!();
                    }
                    0
                }
                Err(err) => fail(err),
            }
        }
        Some(("resolve", args)) => {
            let table = args.get_one::<String>("TABLE").expect("required");
            let choice = if args.get_flag("theirs") {
                ResolveChoice::Theirs
            } else if args.get_flag("ours") {
                ResolveChoice::Ours
            } else {
                return fail(DoltError::InvalidArgument(
                    "pass --ours or --theirs".to_string(),
                ));
            };
            match command::conflicts::resolve(&repo, table, choice) {
                Ok(count) => {
                    println!("Resolved {count} conflicts in {table}");
                    0
                }
                Err(err) => fail(err),
            }
        }
        _ => {
            eprintln!("usage: dolt conflicts <cat|resolve> ...");
            1
        }
    }
}

pub fn reset(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    run(command::reset::reset(
        &repo,
        &ResetOpts {
            hard: sub.get_flag("hard"),
            revision: sub.get_one::<String>("REVISION").cloned(),
        },
    ))
}

pub fn revert(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let revision = sub.get_one::<String>("REVISION").expect("required");
    match command::revert::revert(&repo, revision) {
        Ok(commit) => {
            println!("{}", commit.summary());
            0
        }
        Err(err) => fail(err),
    }
}

pub fn cherry_pick(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let revision = sub.get_one::<String>("REVISION").expect("required");
    match command::cherry_pick::cherry_pick(&repo, revision) {
        Ok(MergeOutcome::Merged(commit)) => {
            println!("Applied {} as {}", revision, commit.id);
            0
        }
        Ok(MergeOutcome::UpToDate) => {
            println!("Nothing to apply.");
            0
        }
        Ok(MergeOutcome::Conflicted {
            conflicted_tables, ..
        }) => {
            for table in &conflicted_tables {
                eprintln!("CONFLICT (content): conflict in {table}");
            }
            1
        }
        Ok(other) => {
            eprintln!("unexpected outcome: {other:?}");
            1
        }
        Err(err) => fail(err),
    }
}

pub fn rebase(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    if sub.get_flag("continue") {
        return render_rebase(command::rebase::continue_rebase(&repo));
    }
    if sub.get_flag("abort") {
        return run(command::rebase::abort(&repo));
    }
    let Some(upstream) = sub.get_one::<String>("UPSTREAM") else {
        return fail(DoltError::InvalidArgument(
            "an upstream to rebase onto is required".to_string(),
        ));
    };
    let empty_policy = match sub.get_one::<String>("empty").map(String::as_str) {
        Some("keep") => EmptyCommitPolicy::Keep,
        Some("error") => EmptyCommitPolicy::Error,
        Some("drop") | None => EmptyCommitPolicy::Drop,
        Some(other) => {
            return fail(DoltError::InvalidArgument(format!(
                "--empty must be keep, drop, or error, not {other}"
            )))
        }
    };
    render_rebase(command::rebase::rebase(
        &repo,
        &RebaseOpts {
            upstream: upstream.clone(),
            plan: None,
            empty_policy,
        },
    ))
}

fn render_rebase(result: libdolt::error::Result<RebaseOutcome>) -> i32 {
    match result {
        Ok(RebaseOutcome::Completed(commit)) => {
            println!("Successfully rebased; HEAD is now {}", commit.id);
            0
        }
        Ok(RebaseOutcome::Paused {
            kind,
            conflicted_tables,
        }) => {
            for table in &conflicted_tables {
                eprintln!("CONFLICT (content): merge conflict in {table}");
            }
            eprintln!("Rebase paused ({kind:?}); resolve and run `dolt rebase --continue`.");
            1
        }
        Err(err) => fail(err),
    }
}

pub fn tag(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    match sub.get_one::<String>("NAME") {
        None => match command::tag::list(&repo) {
            Ok(tags) => {
                for (name, commit) in tags {
                    println!("{name}\t{}", commit.id.short());
                }
                0
            }
            Err(err) => fail(err),
        },
        Some(name) if sub.get_flag("delete") => run(command::tag::delete(&repo, name)),
        Some(name) => run(command::tag::create(
            &repo,
            name,
            sub.get_one::<String>("REVISION").map(String::as_str),
            sub.get_one::<String>("message").map(String::as_str),
        )),
    }
}

pub fn remote(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    match sub.subcommand() {
        Some(("add", args)) => run(command::remote::add(
            &repo,
            args.get_one::<String>("NAME").expect("required"),
            args.get_one::<String>("URL").expect("required"),
        )),
        Some(("remove", args)) => run(command::remote::remove(
            &repo,
            args.get_one::<String>("NAME").expect("required"),
        )),
        _ => match command::remote::list(&repo) {
            Ok(remotes) => {
                for remote in remotes {
                    if sub.get_flag("verbose") {
                        println!("{}\t{}", remote.name, remote.url);
                    } else {
                        println!("{}", remote.name);
                    }
                }
                0
            }
            Err(err) => fail(err),
        },
    }
}

pub fn backup(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    match sub.subcommand() {
        Some(("add", args)) => run(command::backup::add(
            &repo,
            args.get_one::<String>("NAME").expect("required"),
            args.get_one::<String>("URL").expect("required"),
        )),
        Some(("remove", args)) => run(command::backup::remove(
            &repo,
            args.get_one::<String>("NAME").expect("required"),
        )),
        Some(("sync", args)) => run(command::backup::sync(
            &repo,
            args.get_one::<String>("NAME").expect("required"),
        )),
        _ => match command::backup::list(&repo) {
            Ok(backups) => {
                for backup in backups {
                    println!("{}\t{}", backup.name, backup.url);
                }
                0
            }
            Err(err) => fail(err),
        },
    }
}

pub fn push(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let bar = spinner("Pushing...");
    let result = command::push::push(
        &repo,
        &PushOpts {
            remote: sub.get_one::<String>("REMOTE").cloned(),
            branch: sub.get_one::<String>("BRANCH").cloned(),
            force: sub.get_flag("force"),
        },
    );
    bar.finish_and_clear();
    run(result)
}

pub fn fetch(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    let bar = spinner("Fetching...");
    let result = command::fetch::fetch(
        &repo,
        &FetchOpts {
            remote: sub.get_one::<String>("REMOTE").cloned(),
        },
    );
    bar.finish_and_clear();
    run(result.map(|_| ()))
}

pub fn pull(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    match command::pull::pull(
        &repo,
        &PullOpts {
            remote: sub.get_one::<String>("REMOTE").cloned(),
        },
    ) {
        Ok(MergeOutcome::Conflicted {
            conflicted_tables, ..
        }) => {
            for table in &conflicted_tables {
                eprintln!("CONFLICT (content): merge conflict in {table}");
            }
            1
        }
        Ok(_) => 0,
        Err(err) => fail(err),
    }
}

pub fn clone(_global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let url = sub.get_one::<String>("URL").expect("required");
    let dir = match sub.get_one::<String>("DIR") {
        Some(dir) => std::path::PathBuf::from(dir),
        None => {
            // Derive a directory name from the tail of the url
            let tail = url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or("repo");
            std::path::PathBuf::from(tail)
        }
    };
    let depth = match sub.get_one::<String>("depth").map(|d| d.parse::<usize>()) {
        Some(Ok(depth)) => Some(depth),
        Some(Err(_)) => {
            return fail(DoltError::InvalidArgument(
                "--depth must be a positive integer".to_string(),
            ))
        }
        None => None,
    };
    let bar = spinner("Cloning...");
    let result = command::clone::clone(
        &CloneOpts {
            url: url.clone(),
            branch: sub.get_one::<String>("branch").cloned(),
            depth,
            remote_name: libdolt::constants::DEFAULT_REMOTE_NAME.to_string(),
        },
        &dir,
    );
    bar.finish_and_clear();
    match result {
        Ok(_) => {
            println!("Cloned {url} into {}", dir.display());
            0
        }
        Err(err) => fail(err),
    }
}

pub fn gc(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let repo = match repo_from(global) {
        Ok(repo) => repo,
        Err(e) => return fail(e),
    };
    if sub.get_flag("archive") {
        return run(command::gc::archive(&repo));
    }
    match command::gc::gc(&repo) {
        Ok(stats) => {
            let store_dir = libdolt::util::fs::store_dir(&repo.path);
            let bytes: u64 = std::fs::read_dir(&store_dir)
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok().and_then(|e| e.metadata().ok()))
                        .map(|m| m.len())
                        .sum()
                })
                .unwrap_or(0);
            println!(
                "Collected {} of {} chunks ({} live, store is {})",
                stats.collected,
                stats.before,
                stats.after,
                bytesize::ByteSize(bytes)
            );
            0
        }
        Err(err) => fail(err),
    }
}

pub fn config(global: &ArgMatches, sub: &ArgMatches) -> i32 {
    let use_global = sub.get_flag("global");
    let config_path = if use_global {
        match libdolt::util::fs::dolt_home_dir() {
            Ok(home) => home.join(libdolt::constants::GLOBAL_CONFIG_FILENAME),
            Err(e) => return fail(e),
        }
    } else {
        match repo_from(global) {
            Ok(repo) => libdolt::util::fs::dolt_hidden_dir(&repo.path)
                .join(libdolt::constants::REPO_CONFIG_FILENAME),
            Err(e) => return fail(e),
        }
    };
    let mut config = match ConfigFile::load(&config_path) {
        Ok(config) => config,
        Err(e) => return fail(e),
    };
    if let Some(values) = sub.get_many::<String>("add") {
        let values: Vec<&String> = values.collect();
        config.set(values[0], values[1]);
        return run(config.save());
    }
    if let Some(key) = sub.get_one::<String>("get") {
        return match config.get(key) {
            Some(value) => {
                println!("{value}");
                0
            }
            None => 1,
        };
    }
    // --list (default)
    for key in config.keys_with_prefix("") {
        if let Some(value) = config.get(&key) {
            println!("{key} = {value}");
        }
    }
    0
}
