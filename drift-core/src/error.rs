//! Error kinds shared across the drift core.
//!
//! Lower layers fail fast with a typed kind; the repository facade adds
//! context (operation, path, ref, digest) at its boundary. Nothing in the
//! core retries except the object store's idempotent write and the bounded
//! inflate-buffer growth in `compress`.

use crate::oid::ObjectId;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during repository operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt object: {0}")]
    Corrupt(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not a drift repository: {0}")]
    NotInitialized(String),

    #[error("unstaged changes present: {0}")]
    DirtyWorkingTree(String),

    #[error("non-fast-forward update of {0}")]
    NonFastForward(String),

    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    #[error("operation requires a detached HEAD")]
    DetachedHeadRequired,

    #[error("operation requires HEAD to be on a branch")]
    SymbolicHeadRequired,

    #[error("cannot merge a branch with itself")]
    SelfMerge,

    #[error("merge conflicts in: {}", paths.join(", "))]
    ConflictsPresent { paths: Vec<String> },

    #[error("no common ancestor between branches")]
    NoCommonAncestor,

    #[error("merge in progress: {0}")]
    MergeInProgress(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl Error {
    /// Not-found error for a missing object digest.
    pub fn missing_object(id: &ObjectId) -> Self {
        Error::NotFound(format!("object {}", id.to_hex()))
    }
}
