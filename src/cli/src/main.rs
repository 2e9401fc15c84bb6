use clap::Command;
use env_logger::Env;

pub mod cmd_setup;
pub mod helpers;
pub mod parse_and_run;

fn main() {
    env_logger::init_from_env(Env::default());

    let command = Command::new("dolt")
        .version(libdolt::constants::DOLT_VERSION)
        .about("Dolt is a SQL database you can branch, diff, merge, and clone")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            clap::Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .help("Run as if dolt was started in this directory.")
                .action(clap::ArgAction::Set),
        )
        .subcommand(cmd_setup::init())
        .subcommand(cmd_setup::status())
        .subcommand(cmd_setup::add())
        .subcommand(cmd_setup::commit())
        .subcommand(cmd_setup::branch())
        .subcommand(cmd_setup::checkout())
        .subcommand(cmd_setup::log())
        .subcommand(cmd_setup::diff())
        .subcommand(cmd_setup::merge())
        .subcommand(cmd_setup::conflicts())
        .subcommand(cmd_setup::reset())
        .subcommand(cmd_setup::revert())
        .subcommand(cmd_setup::cherry_pick())
        .subcommand(cmd_setup::rebase())
        .subcommand(cmd_setup::tag())
        .subcommand(cmd_setup::remote())
        .subcommand(cmd_setup::backup())
        .subcommand(cmd_setup::push())
        .subcommand(cmd_setup::fetch())
        .subcommand(cmd_setup::pull())
        .subcommand(cmd_setup::clone())
        .subcommand(cmd_setup::gc())
        .subcommand(cmd_setup::config());

    let matches = command.get_matches();
    let exit_code = match matches.subcommand() {
        Some((cmd_setup::INIT, sub)) => parse_and_run::init(&matches, sub),
        Some((cmd_setup::STATUS, sub)) => parse_and_run::status(&matches, sub),
        Some((cmd_setup::ADD, sub)) => parse_and_run::add(&matches, sub),
        Some((cmd_setup::COMMIT, sub)) => parse_and_run::commit(&matches, sub),
        Some((cmd_setup::BRANCH, sub)) => parse_and_run::branch(&matches, sub),
        Some((cmd_setup::CHECKOUT, sub)) => parse_and_run::checkout(&matches, sub),
        Some((cmd_setup::LOG, sub)) => parse_and_run::log(&matches, sub),
        Some((cmd_setup::DIFF, sub)) => parse_and_run::diff(&matches, sub),
        Some((cmd_setup::MERGE, sub)) => parse_and_run::merge(&matches, sub),
        Some((cmd_setup::CONFLICTS, sub)) => parse_and_run::conflicts(&matches, sub),
        Some((cmd_setup::RESET, sub)) => parse_and_run::reset(&matches, sub),
        Some((cmd_setup::REVERT, sub)) => parse_and_run::revert(&matches, sub),
        Some((cmd_setup::CHERRY_PICK, sub)) => parse_and_run::cherry_pick(&matches, sub),
        Some((cmd_setup::REBASE, sub)) => parse_and_run::rebase(&matches, sub),
        Some((cmd_setup::TAG, sub)) => parse_and_run::tag(&matches, sub),
        Some((cmd_setup::REMOTE, sub)) => parse_and_run::remote(&matches, sub),
        Some((cmd_setup::BACKUP, sub)) => parse_and_run::backup(&matches, sub),
        Some((cmd_setup::PUSH, sub)) => parse_and_run::push(&matches, sub),
        Some((cmd_setup::FETCH, sub)) => parse_and_run::fetch(&matches, sub),
        Some((cmd_setup::PULL, sub)) => parse_and_run::pull(&matches, sub),
        Some((cmd_setup::CLONE, sub)) => parse_and_run::clone(&matches, sub),
        Some((cmd_setup::GC, sub)) => parse_and_run::gc(&matches, sub),
        Some((cmd_setup::CONFIG, sub)) => parse_and_run::config(&matches, sub),
        Some((command, _)) => {
            eprintln!("Unknown command `dolt {command}`");
            1
        }
        _ => unreachable!(),
    };
    std::process::exit(exit_code);
}
