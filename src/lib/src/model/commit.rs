use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Hash;

/// Author or committer identity stamped on a commit
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// The commit object exactly as it is serialized into a chunk. The commit id
/// is the hash of these bytes, so it cannot live inside.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredCommit {
    pub root: Hash,
    pub parents: Vec<Hash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A commit loaded from the store, carrying its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: Hash,
    pub root: Hash,
    pub parent_ids: Vec<Hash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    pub fn from_stored(id: Hash, stored: StoredCommit) -> Commit {
        Commit {
            id,
            root: stored.root,
            parent_ids: stored.parents,
            author: stored.author,
            committer: stored.committer,
            message: stored.message,
        }
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    /// First line of the message, for log --oneline style output
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id.short(), self.summary())
    }
}

/// An annotated tag object. Lightweight tags point straight at a commit and
/// never materialize one of these.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredTag {
    pub commit: Hash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagger: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
