//! Clap command definitions for every dolt verb. Flags mirror the stored
//! procedure contracts exactly.

use clap::{arg, Arg, ArgAction, Command};

pub const INIT: &str = "init";
pub const STATUS: &str = "status";
pub const ADD: &str = "add";
pub const COMMIT: &str = "commit";
pub const BRANCH: &str = "branch";
pub const CHECKOUT: &str = "checkout";
pub const LOG: &str = "log";
pub const DIFF: &str = "diff";
pub const MERGE: &str = "merge";
pub const CONFLICTS: &str = "conflicts";
pub const RESET: &str = "reset";
pub const REVERT: &str = "revert";
pub const CHERRY_PICK: &str = "cherry-pick";
pub const REBASE: &str = "rebase";
pub const TAG: &str = "tag";
pub const REMOTE: &str = "remote";
pub const BACKUP: &str = "backup";
pub const PUSH: &str = "push";
pub const FETCH: &str = "fetch";
pub const PULL: &str = "pull";
pub const CLONE: &str = "clone";
pub const GC: &str = "gc";
pub const CONFIG: &str = "config";

pub fn init() -> Command {
    Command::new(INIT).about("Create an empty dolt data repository in the current directory")
}

pub fn status() -> Command {
    Command::new(STATUS).about("Show the working and staged tables and any conflicts")
}

pub fn add() -> Command {
    Command::new(ADD)
        .about("Add table changes to the set of staged changes")
        .arg(
            Arg::new("all")
                .long("all")
                .short('A')
                .help("Stage all tables, including new and dropped ones.")
                .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("tables").num_args(0..).help("Tables to stage"))
}

pub fn commit() -> Command {
    Command::new(COMMIT)
        .about("Record changes staged in the working set as a new commit")
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .help("The commit message.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .short('a')
                .help("Stage all modified tracked tables before committing.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ALL")
                .short('A')
                .help("Stage every table, including new and dropped ones.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("amend")
                .long("amend")
                .help("Replace the current HEAD commit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("allow-empty")
                .long("allow-empty")
                .help("Permit recording a commit with no staged changes.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip-empty")
                .long("skip-empty")
                .help("Exit without error when there is nothing to commit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .short('f')
                .help("Commit even with recorded conflicts or violations.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("author")
                .long("author")
                .help("Override the commit author: \"Name <email>\".")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("date")
                .long("date")
                .help("Override the author date (ISO-8601).")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("committer-date")
                .long("committer-date")
                .help("Override the committer date (ISO-8601).")
                .action(ArgAction::Set),
        )
}

pub fn branch() -> Command {
    Command::new(BRANCH)
        .about("Create, list, or delete branches")
        .arg(
            Arg::new("delete")
                .long("delete")
                .short('d')
                .help("Delete a branch.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .short('f')
                .help("Delete even if the branch is not fully merged.")
                .action(ArgAction::SetTrue),
        )
        .arg(arg!([NAME] "Branch name"))
        .arg(arg!([START] "Commit or branch to start from"))
}

pub fn checkout() -> Command {
    Command::new(CHECKOUT)
        .about("Switch to another branch")
        .arg(
            Arg::new("branch")
                .short('b')
                .help("Create the branch and check it out.")
                .action(ArgAction::SetTrue),
        )
        .arg(arg!(<NAME> "Branch to check out"))
}

pub fn log() -> Command {
    Command::new(LOG)
        .about("Show commit history")
        .arg(arg!([REVISION] "Branch, tag, hash, or BASE..HEAD range. Defaults to HEAD."))
}

pub fn diff() -> Command {
    Command::new(DIFF)
        .about("Show changes between two revisions of the database")
        .arg(arg!([FROM] "From revision. Defaults to HEAD."))
        .arg(arg!([TO] "To revision. Defaults to WORKING."))
        .arg(
            Arg::new("tables")
                .long("tables")
                .short('t')
                .help("Comma separated list of tables to diff.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("patch")
                .long("patch")
                .help("Print SQL patch statements instead of summaries.")
                .action(ArgAction::SetTrue),
        )
}

pub fn merge() -> Command {
    Command::new(MERGE)
        .about("Join another branch's history into the current branch")
        .arg(arg!([REVISION] "Branch or commit to merge"))
        .arg(
            Arg::new("no-ff")
                .long("no-ff")
                .help("Always create a merge commit, even for fast-forwards.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ff-only")
                .long("ff-only")
                .help("Refuse to merge unless it is a fast-forward.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("squash")
                .long("squash")
                .help("Stage the merged changes without committing.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-commit")
                .long("no-commit")
                .help("Perform the merge but stop before the merge commit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .help("Message for the merge commit.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("abort")
                .long("abort")
                .help("Abort the in-progress merge and restore the working set.")
                .action(ArgAction::SetTrue),
        )
}

pub fn conflicts() -> Command {
    Command::new(CONFLICTS)
        .about("Inspect and resolve merge conflicts")
        .subcommand(
            Command::new("cat")
                .about("Print the conflicts recorded for a table")
                .arg(arg!(<TABLE> "Table to inspect")),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve every conflict on a table")
                .arg(arg!(<TABLE> "Table to resolve"))
                .arg(
                    Arg::new("ours")
                        .long("ours")
                        .help("Keep our version of each conflicted row.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("theirs")
                        .long("theirs")
                        .help("Take their version of each conflicted row.")
                        .action(ArgAction::SetTrue),
                ),
        )
}

pub fn reset() -> Command {
    Command::new(RESET)
        .about("Move HEAD, optionally resetting the working set")
        .arg(
            Arg::new("hard")
                .long("hard")
                .help("Overwrite working and staged with the target commit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("soft")
                .long("soft")
                .help("Move HEAD only.")
                .action(ArgAction::SetTrue),
        )
        .arg(arg!([REVISION] "Target revision. Defaults to HEAD."))
}

pub fn revert() -> Command {
    Command::new(REVERT)
        .about("Apply the inverse of a commit as a new commit")
        .arg(arg!(<REVISION> "Commit to revert"))
}

pub fn cherry_pick() -> Command {
    Command::new(CHERRY_PICK)
        .about("Apply the changes of an existing commit onto HEAD")
        .arg(arg!(<REVISION> "Commit to pick"))
}

pub fn rebase() -> Command {
    Command::new(REBASE)
        .about("Replay commits from the current branch onto another base")
        .arg(arg!([UPSTREAM] "The base to replay onto"))
        .arg(
            Arg::new("interactive")
                .long("interactive")
                .short('i')
                .help("Edit the plan before replaying.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("continue")
                .long("continue")
                .help("Resume after resolving conflicts or editing.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("abort")
                .long("abort")
                .help("Abandon the rebase and restore the original branch.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("empty")
                .long("empty")
                .help("What to do with empty picks: keep, drop, or error.")
                .action(ArgAction::Set),
        )
}

pub fn tag() -> Command {
    Command::new(TAG)
        .about("Create, list, or delete tags")
        .arg(
            Arg::new("delete")
                .long("delete")
                .short('d')
                .help("Delete a tag.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .help("Create an annotated tag with this message.")
                .action(ArgAction::Set),
        )
        .arg(arg!([NAME] "Tag name"))
        .arg(arg!([REVISION] "Commit to tag. Defaults to HEAD."))
}

pub fn remote() -> Command {
    Command::new(REMOTE)
        .about("Manage the set of tracked remotes")
        .subcommand(
            Command::new("add")
                .arg(arg!(<NAME> "Remote name"))
                .arg(arg!(<URL> "Remote url")),
        )
        .subcommand(Command::new("remove").arg(arg!(<NAME> "Remote name")))
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Show remote urls.")
                .action(ArgAction::SetTrue),
        )
}

pub fn backup() -> Command {
    Command::new(BACKUP)
        .about("Manage backups, remotes that mirror every ref")
        .subcommand(
            Command::new("add")
                .arg(arg!(<NAME> "Backup name"))
                .arg(arg!(<URL> "Backup url")),
        )
        .subcommand(Command::new("remove").arg(arg!(<NAME> "Backup name")))
        .subcommand(Command::new("sync").arg(arg!(<NAME> "Backup to sync")))
}

pub fn push() -> Command {
    Command::new(PUSH)
        .about("Update a remote branch with local commits")
        .arg(arg!([REMOTE] "Remote name. Defaults to origin."))
        .arg(arg!([BRANCH] "Branch to push. Defaults to the current branch."))
        .arg(
            Arg::new("force")
                .long("force")
                .short('f')
                .help("Push even when the update is not a fast-forward.")
                .action(ArgAction::SetTrue),
        )
}

pub fn fetch() -> Command {
    Command::new(FETCH)
        .about("Download objects and refs from the remote repository")
        .arg(arg!([REMOTE] "Remote name. Defaults to origin."))
}

pub fn pull() -> Command {
    Command::new(PULL)
        .about("Fetch from a remote and merge its branch into the current branch")
        .arg(arg!([REMOTE] "Remote name. Defaults to origin."))
}

pub fn clone() -> Command {
    Command::new(CLONE)
        .about("Clone a remote database into a new directory")
        .arg(arg!(<URL> "Remote url"))
        .arg(arg!([DIR] "Directory to clone into"))
        .arg(
            Arg::new("branch")
                .long("branch")
                .short('b')
                .help("Check out this branch instead of the default.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("depth")
                .long("depth")
                .help("Create a shallow clone truncated to this many commits.")
                .action(ArgAction::Set),
        )
}

pub fn gc() -> Command {
    Command::new(GC)
        .about("Collect unreachable chunks from the repository store")
        .arg(
            Arg::new("archive")
                .long("archive")
                .help("Re-pack the store into a dictionary-compressed archive.")
                .action(ArgAction::SetTrue),
        )
}

pub fn config() -> Command {
    Command::new(CONFIG)
        .about("Get and set repository or global options")
        .arg(
            Arg::new("global")
                .long("global")
                .help("Operate on the global config file.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .help("List all configured options.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("add")
                .long("add")
                .num_args(2)
                .value_names(["NAME", "VALUE"])
                .help("Set an option."),
        )
        .arg(
            Arg::new("get")
                .long("get")
                .help("Print one option.")
                .action(ArgAction::Set),
        )
}
