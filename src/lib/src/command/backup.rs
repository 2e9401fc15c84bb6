//! Backups: remotes that mirror every ref, synced atomically at the
//! ref-set level.

use std::sync::Arc;

use crate::core::remote::{open_transport, Transport};
use crate::error::{DoltError, Result};
use crate::model::{LocalRepository, Remote};
use crate::util::cancel::CancelToken;

pub fn add(repo: &LocalRepository, name: &str, url: &str) -> Result<()> {
    repo.add_backup(name, url)
}

pub fn remove(repo: &LocalRepository, name: &str) -> Result<()> {
    repo.remove_backup(name)
}

pub fn list(repo: &LocalRepository) -> Result<Vec<Remote>> {
    repo.backups()
}

pub fn sync(repo: &LocalRepository, name: &str) -> Result<()> {
    let backup = repo
        .backups()?
        .into_iter()
        .find(|b| b.name == name)
        .ok_or_else(|| DoltError::NotFound(format!("backup {name}")))?;
    let transport: Arc<dyn Transport> = Arc::from(open_transport(&backup.url)?);
    crate::core::remote::sync::backup_sync(&repo.store(), &transport, &CancelToken::new())
}
