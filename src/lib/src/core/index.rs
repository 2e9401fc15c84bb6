//! Readers and writers over the ref namespace, the commit graph, and the
//! per-branch working sets. All named state lives in one ref map at the
//! store root, so every mutation is a single compare-and-swap.

pub mod commit_reader;
pub mod commit_writer;
pub mod refs;
pub mod revisions;
pub mod walk;
pub mod working_set;

pub use commit_reader::{CommitReader, History};
pub use commit_writer::CommitWriter;
pub use refs::{validate_ref_name, RefReader, RefWriter};
pub use working_set::{MergeState, WorkingSet, WorkingSetData};
