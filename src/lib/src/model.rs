pub mod branch;
pub mod commit;
pub mod conflict;
pub mod diff;
pub mod hash;
pub mod remote;
pub mod repository;
pub mod schema;
pub mod status;

pub use branch::{Branch, RemoteBranch};
pub use commit::{Commit, Signature, StoredCommit, StoredTag};
pub use conflict::{ConflictEntry, ViolationEntry, ViolationKind};
pub use diff::{AddRemoveModifyCounts, RowChange, RowChangeKind, TableDiffSummary};
pub use hash::Hash;
pub use remote::Remote;
pub use repository::LocalRepository;
pub use schema::Schema;
pub use status::{StagedData, TableStatus};
