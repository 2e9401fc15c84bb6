//! Constants used throughout the codebase
//!

/// Rust library version
pub const DOLT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// # Filenames and dirs
/// .dolt is the name of the hidden directory where all our data lives
pub const DOLT_HIDDEN_DIR: &str = ".dolt";
/// Folder name for dolt home within the user's home directory
pub const DOLT_HOME_DIR: &str = ".dolt";
/// Global config file within the dolt home directory
pub const GLOBAL_CONFIG_FILENAME: &str = "config_global.json";
/// Per-repo config file within .dolt
pub const REPO_CONFIG_FILENAME: &str = "config.json";
/// noms/ holds the chunk store (manifest, journal, table files)
pub const STORE_DIR: &str = "noms";
/// The manifest file within the store directory
pub const MANIFEST_FILE: &str = "manifest";
/// The chunk journal within the store directory
pub const JOURNAL_FILE: &str = "journal";
/// Exclusive database lock taken by a running server
pub const SERVER_LOCK_FILE: &str = "sql-server.lock";
/// HEAD file holds the name of the checked-out branch
pub const HEAD_FILE: &str = "HEAD";
/// Hashes of commits whose content is absent (shallow clones)
pub const GHOSTS_FILE: &str = "shallow";

/// Manifest format identifier for the legacy storage format
pub const FORMAT_LD1: &str = "__LD_1__";
/// Manifest format identifier for the current storage format
pub const FORMAT_DOLT: &str = "__DOLT__";
/// Manifest format identifier for the dev storage format
pub const FORMAT_DOLT_DEV: &str = "__DOLT_DEV__";

/// Magic trailer bytes closing a table file footer
pub const TABLE_FILE_MAGIC: &[u8; 8] = b"DOLTTBLF";
/// Magic trailer bytes closing an archive file footer
pub const ARCHIVE_FILE_MAGIC: &[u8; 8] = b"DOLTARCV";
/// Minimum number of sampled chunks required to train an archive dictionary
pub const ARCHIVE_MIN_SAMPLES: usize = 25;
/// zstd level for table file chunks
pub const ZSTD_LEVEL: i32 = 3;

/// # Refs namespace
pub const BRANCHES_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";
pub const WORKING_SETS_PREFIX: &str = "refs/internal/heads/";
pub const BACKUP_LOCK_REF: &str = "refs/internal/backup-lock";
/// Prefix for the working branch a paused rebase resolves conflicts on
pub const REBASE_BRANCH_PREFIX: &str = "dolt_rebase_";

/// Default branch name when `init.defaultBranch` is not configured
pub const DEFAULT_BRANCH_NAME: &str = "main";
/// Default remote name: origin
pub const DEFAULT_REMOTE_NAME: &str = "origin";

/// Config keys
pub const CONFIG_USER_NAME: &str = "user.name";
pub const CONFIG_USER_EMAIL: &str = "user.email";
pub const CONFIG_DEFAULT_BRANCH: &str = "init.defaultBranch";
pub const CONFIG_REMOTE_PREFIX: &str = "remote.";
pub const CONFIG_BACKUP_PREFIX: &str = "backup.";

/// Environment variables honored by commit and clone paths
pub const ENV_AUTHOR_DATE: &str = "DOLT_AUTHOR_DATE";
pub const ENV_COMMITTER_DATE: &str = "DOLT_COMMITTER_DATE";
pub const ENV_ROOT_PATH: &str = "DOLT_ROOT_PATH";

/// Target chunk size for the value layer before a value is split into a
/// balanced byte tree (~4 KiB)
pub const VALUE_CHUNK_TARGET: usize = 4 * 1024;

/// Average prolly tree node size in entries, expressed as the number of low
/// rolling-hash bits that must be zero at a boundary
pub const NODE_BOUNDARY_BITS: u32 = 5;
/// Minimum entries per prolly node
pub const NODE_MIN_ENTRIES: usize = 4;
/// Maximum entries per prolly node
pub const NODE_MAX_ENTRIES: usize = 128;

/// Number of retries for a racing root CAS during push
pub const PUSH_CAS_RETRIES: usize = 5;
/// Bounded retries for chunk store I/O before surfacing the error
pub const IO_RETRIES: usize = 3;

/// Process-wide chunk cache capacity in decoded chunks
pub const CHUNK_CACHE_CAPACITY: usize = 16 * 1024;
