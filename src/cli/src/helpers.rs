//! Shared CLI plumbing: repository resolution, error-to-exit-code mapping,
//! and the `"Name <email>"` author parser.

use std::path::PathBuf;

use clap::ArgMatches;
use libdolt::error::{DoltError, Result};
use libdolt::model::LocalRepository;

/// Resolve the repository from `--data-dir` or the current directory
pub fn repo_from(global: &ArgMatches) -> Result<LocalRepository> {
    match global.get_one::<String>("data-dir") {
        Some(dir) => LocalRepository::open(PathBuf::from(dir)),
        None => LocalRepository::from_current_dir(),
    }
}

/// Print the error and return its exit code: 1 for user and data errors,
/// 2 when another process holds the database lock
pub fn fail(err: DoltError) -> i32 {
    eprintln!("error: {err}");
    err.exit_code()
}

pub fn run(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => fail(err),
    }
}

/// Parse `"Name <email>"` into its parts
pub fn parse_author(author: &str) -> Result<(String, String)> {
    let open = author.find('<');
    let close = author.rfind('>');
    match (open, close) {
        (Some(open), Some(close)) if open < close => {
            let name = author[..open].trim().to_string();
            let email = author[open + 1..close].trim().to_string();
            if name.is_empty() || email.is_empty() {
                return Err(DoltError::InvalidArgument(format!(
                    "author must look like \"Name <email>\": {author:?}"
                )));
            }
            Ok((name, email))
        }
        _ => Err(DoltError::InvalidArgument(format!(
            "author must look like \"Name <email>\": {author:?}"
        ))),
    }
}

pub fn parse_date(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&chrono::Utc))
        .map_err(|_| DoltError::InvalidArgument(format!("not an ISO-8601 date: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_author() {
        let (name, email) = parse_author("Ada Lovelace <ada@example.com>").unwrap();
        assert_eq!(name, "Ada Lovelace");
        assert_eq!(email, "ada@example.com");
        assert!(parse_author("no email").is_err());
        assert!(parse_author("<only@email>").is_err());
    }
}
