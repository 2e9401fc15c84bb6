//! Writes commit and tag objects into the chunk store.

use chrono::{DateTime, Utc};

use crate::core::db::StoreRef;
use crate::error::Result;
use crate::model::{Commit, Hash, Signature, StoredCommit, StoredTag};

pub struct CommitWriter {
    store: StoreRef,
}

impl CommitWriter {
    pub fn new(store: StoreRef) -> CommitWriter {
        CommitWriter { store }
    }

    pub fn write_commit(&self, stored: StoredCommit) -> Result<Commit> {
        let id = self.store.put(&serde_json::to_vec(&stored)?)?;
        Ok(Commit::from_stored(id, stored))
    }

    pub fn create_commit(
        &self,
        root: Hash,
        parents: Vec<Hash>,
        author: Signature,
        committer: Signature,
        message: impl AsRef<str>,
    ) -> Result<Commit> {
        self.write_commit(StoredCommit {
            root,
            parents,
            author,
            committer,
            message: message.as_ref().to_string(),
            signature: None,
        })
    }

    pub fn write_tag(&self, tag: &StoredTag) -> Result<Hash> {
        self.store.put(&serde_json::to_vec(tag)?)
    }
}

/// Build a signature, honoring an explicit override date (from `--date` or
/// the date environment variables)
pub fn signature(
    name: impl AsRef<str>,
    email: impl AsRef<str>,
    date: Option<DateTime<Utc>>,
) -> Signature {
    Signature {
        name: name.as_ref().to_string(),
        email: email.as_ref().to_string(),
        timestamp: date.unwrap_or_else(Utc::now),
    }
}
