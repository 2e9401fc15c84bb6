//! Filesystem helpers shared by the store and the repo layout.

use std::path::{Path, PathBuf};

use crate::constants::{DOLT_HIDDEN_DIR, DOLT_HOME_DIR, ENV_ROOT_PATH, STORE_DIR};
use crate::error::{DoltError, Result};

/// `<repo>/.dolt`
pub fn dolt_hidden_dir(repo_path: impl AsRef<Path>) -> PathBuf {
    repo_path.as_ref().join(DOLT_HIDDEN_DIR)
}

/// `<repo>/.dolt/noms`
pub fn store_dir(repo_path: impl AsRef<Path>) -> PathBuf {
    dolt_hidden_dir(repo_path).join(STORE_DIR)
}

/// `~/.dolt`, honoring DOLT_ROOT_PATH for tests and sandboxed installs
pub fn dolt_home_dir() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(ENV_ROOT_PATH) {
        return Ok(PathBuf::from(root).join(DOLT_HOME_DIR));
    }
    let home = std::env::var("HOME")
        .map_err(|_| DoltError::basic_str("cannot locate home directory"))?;
    Ok(PathBuf::from(home).join(DOLT_HOME_DIR))
}

pub fn write_to_path(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path.as_ref(), contents.as_ref())?;
    Ok(())
}

/// Walk up from `dir` looking for a directory containing `.dolt`
pub fn repo_root_from(dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = Some(dir.as_ref().to_path_buf());
    while let Some(dir) = current {
        if dolt_hidden_dir(&dir).exists() {
            return Some(dir);
        }
        current = dir.parent().map(Path::to_path_buf);
    }
    None
}
