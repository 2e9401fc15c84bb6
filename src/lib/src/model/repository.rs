//! A local repository: the `.dolt` directory, its chunk store, the HEAD
//! file naming the checked-out branch, and the repo-level config.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigFile, DoltConfig};
use crate::constants::{
    CONFIG_BACKUP_PREFIX, CONFIG_REMOTE_PREFIX, HEAD_FILE, REPO_CONFIG_FILENAME,
};
use crate::core::db::{DiskStore, StoreRef};
use crate::error::{DoltError, Result};
use crate::model::Remote;
use crate::util;

#[derive(Clone)]
pub struct LocalRepository {
    pub path: PathBuf,
    store: Arc<DiskStore>,
}

impl LocalRepository {
    /// Create the `.dolt` directory and an empty chunk store
    pub fn init(path: impl AsRef<Path>) -> Result<LocalRepository> {
        let path = path.as_ref().to_path_buf();
        let hidden = util::fs::dolt_hidden_dir(&path);
        if hidden.exists() {
            return Err(DoltError::AlreadyExists(format!(
                "repository at {}",
                path.display()
            )));
        }
        std::fs::create_dir_all(&hidden)?;
        let store = DiskStore::create(util::fs::store_dir(&path))?;
        Ok(LocalRepository {
            path,
            store: Arc::new(store),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<LocalRepository> {
        let path = path.as_ref().to_path_buf();
        if !util::fs::dolt_hidden_dir(&path).exists() {
            return Err(DoltError::NotFound(format!(
                "no dolt repository at {}",
                path.display()
            )));
        }
        let store = DiskStore::open(util::fs::store_dir(&path))?;
        Ok(LocalRepository {
            path,
            store: Arc::new(store),
        })
    }

    pub fn from_current_dir() -> Result<LocalRepository> {
        let cwd = std::env::current_dir()?;
        let root = util::fs::repo_root_from(&cwd)
            .ok_or_else(|| DoltError::NotFound("no dolt repository found".to_string()))?;
        LocalRepository::open(root)
    }

    pub fn store(&self) -> StoreRef {
        self.store.clone()
    }

    pub fn disk_store(&self) -> &Arc<DiskStore> {
        &self.store
    }

    fn head_path(&self) -> PathBuf {
        util::fs::dolt_hidden_dir(&self.path).join(HEAD_FILE)
    }

    pub fn current_branch(&self) -> Result<String> {
        let contents = std::fs::read_to_string(self.head_path())
            .map_err(|_| DoltError::NotFound("HEAD".to_string()))?;
        Ok(contents.trim().to_string())
    }

    pub fn set_current_branch(&self, branch: &str) -> Result<()> {
        util::fs::write_to_path(self.head_path(), format!("{branch}\n"))
    }

    pub fn config(&self) -> Result<DoltConfig> {
        DoltConfig::load(Some(&self.path))
    }

    fn repo_config(&self) -> Result<ConfigFile> {
        ConfigFile::load(util::fs::dolt_hidden_dir(&self.path).join(REPO_CONFIG_FILENAME))
    }

    pub fn remotes(&self) -> Result<Vec<Remote>> {
        Ok(self.config()?.remotes())
    }

    pub fn get_remote(&self, name: &str) -> Result<Option<Remote>> {
        Ok(self.remotes()?.into_iter().find(|r| r.name == name))
    }

    pub fn backups(&self) -> Result<Vec<Remote>> {
        Ok(self.config()?.backups())
    }

    /// A backup and a remote may not share an address
    fn check_address_collision(&self, url: &str) -> Result<()> {
        let config = self.config()?;
        if config
            .remotes()
            .iter()
            .chain(config.backups().iter())
            .any(|r| r.url == url)
        {
            return Err(DoltError::AlreadyExists(format!("address {url}")));
        }
        Ok(())
    }

    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.check_address_collision(url)?;
        let mut config = self.repo_config()?;
        let key = format!("{CONFIG_REMOTE_PREFIX}{name}.url");
        if config.get(&key).is_some() {
            return Err(DoltError::AlreadyExists(format!("remote {name}")));
        }
        config.set(key, url);
        config.save()
    }

    pub fn remove_remote(&self, name: &str) -> Result<()> {
        let mut config = self.repo_config()?;
        if !config.unset(&format!("{CONFIG_REMOTE_PREFIX}{name}.url")) {
            return Err(DoltError::remote_not_found(name));
        }
        config.save()
    }

    pub fn add_backup(&self, name: &str, url: &str) -> Result<()> {
        self.check_address_collision(url)?;
        let mut config = self.repo_config()?;
        let key = format!("{CONFIG_BACKUP_PREFIX}{name}.url");
        if config.get(&key).is_some() {
            return Err(DoltError::AlreadyExists(format!("backup {name}")));
        }
        config.set(key, url);
        config.save()
    }

    pub fn remove_backup(&self, name: &str) -> Result<()> {
        let mut config = self.repo_config()?;
        if !config.unset(&format!("{CONFIG_BACKUP_PREFIX}{name}.url")) {
            return Err(DoltError::NotFound(format!("backup {name}")));
        }
        config.save()
    }
}
