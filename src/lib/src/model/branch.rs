use serde::{Deserialize, Serialize};

use crate::model::Hash;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub commit_id: Hash,
}

/// A (remote name, branch name) pair, the target of push/pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    pub remote: String,
    pub branch: String,
}

impl RemoteBranch {
    pub fn new(remote: impl AsRef<str>, branch: impl AsRef<str>) -> RemoteBranch {
        RemoteBranch {
            remote: remote.as_ref().to_string(),
            branch: branch.as_ref().to_string(),
        }
    }
}
