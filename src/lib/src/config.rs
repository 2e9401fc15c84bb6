//! Configuration: a global `~/.dolt/config_global.json` and a per-repo
//! `.dolt/config.json`, each a flat string-to-string JSON map. Repo values
//! override global ones. Unknown keys warn on stderr but never fail.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::{
    CONFIG_BACKUP_PREFIX, CONFIG_DEFAULT_BRANCH, CONFIG_REMOTE_PREFIX, CONFIG_USER_EMAIL,
    CONFIG_USER_NAME, DEFAULT_BRANCH_NAME, GLOBAL_CONFIG_FILENAME, REPO_CONFIG_FILENAME,
};
use crate::error::{DoltError, Result};
use crate::model::Remote;
use crate::util;

const KNOWN_KEYS: &[&str] = &[
    CONFIG_USER_NAME,
    CONFIG_USER_EMAIL,
    CONFIG_DEFAULT_BRANCH,
    "core.editor",
    "metrics.disabled",
    "metrics.host",
    "push.autoSetupRemote",
];

#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<ConfigFile> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(ConfigFile {
                path,
                values: BTreeMap::new(),
            });
        }
        let contents = std::fs::read_to_string(&path)?;
        let values: BTreeMap<String, String> = serde_json::from_str(&contents)?;
        for key in values.keys() {
            let known = KNOWN_KEYS.contains(&key.as_str())
                || key.starts_with(CONFIG_REMOTE_PREFIX)
                || key.starts_with(CONFIG_BACKUP_PREFIX);
            if !known {
                eprintln!("warning: unknown config key {key:?} in {}", path.display());
            }
        }
        Ok(ConfigFile { path, values })
    }

    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.values)?;
        util::fs::write_to_path(&self.path, contents)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.values
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
    }

    pub fn unset(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.values
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Merged view: repo config over global config
#[derive(Debug, Clone, Default)]
pub struct DoltConfig {
    pub global: ConfigFile,
    pub repo: Option<ConfigFile>,
}

impl DoltConfig {
    pub fn load(repo_path: Option<&Path>) -> Result<DoltConfig> {
        let global_path = util::fs::dolt_home_dir()?.join(GLOBAL_CONFIG_FILENAME);
        let global = ConfigFile::load(global_path)?;
        let repo = match repo_path {
            Some(path) => Some(ConfigFile::load(
                util::fs::dolt_hidden_dir(path).join(REPO_CONFIG_FILENAME),
            )?),
            None => None,
        };
        Ok(DoltConfig { global, repo })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.repo
            .as_ref()
            .and_then(|r| r.get(key))
            .or_else(|| self.global.get(key))
    }

    pub fn default_branch(&self) -> String {
        self.get(CONFIG_DEFAULT_BRANCH)
            .unwrap_or(DEFAULT_BRANCH_NAME)
            .to_string()
    }

    /// user.name and user.email are required before any commit
    pub fn user_identity(&self) -> Result<(String, String)> {
        match (self.get(CONFIG_USER_NAME), self.get(CONFIG_USER_EMAIL)) {
            (Some(name), Some(email)) => Ok((name.to_string(), email.to_string())),
            _ => Err(DoltError::AuthMissing),
        }
    }

    fn named_urls(&self, prefix: &str) -> Vec<Remote> {
        let mut out = Vec::new();
        if let Some(repo) = &self.repo {
            for key in repo.keys_with_prefix(prefix) {
                if let Some(name) = key
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_suffix(".url"))
                {
                    if let Some(url) = repo.get(&key) {
                        out.push(Remote::new(name, url));
                    }
                }
            }
        }
        out
    }

    pub fn remotes(&self) -> Vec<Remote> {
        self.named_urls(CONFIG_REMOTE_PREFIX)
    }

    pub fn backups(&self) -> Vec<Remote> {
        self.named_urls(CONFIG_BACKUP_PREFIX)
    }
}
