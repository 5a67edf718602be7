//! Drift core library
//!
//! A minimal distributed version-control engine:
//! - Content-addressed object store (blob, tree, commit) with deflate
//!   compression and fan-out layout
//! - Staging index and tree-from-index construction
//! - Commit graph with ancestry and lowest-common-ancestor queries
//! - Three-way merge with textual conflict markers and merge-state tracking
//! - Working-tree / index / tree snapshot reconciliation
//! - Myers line diff with unified output
//! - Line-framed sync protocol for clone, fetch, and push with
//!   fast-forward enforcement

pub mod compress;
pub mod config;
pub mod diff;
pub mod error;
pub mod fsutil;
pub mod graph;
pub mod index;
pub mod merge;
pub mod object;
pub mod oid;
pub mod protocol;
pub mod refs;
pub mod remote;
pub mod repo;
pub mod status;
pub mod store;
pub mod tree;
pub mod worktree;

pub use config::{Clock, Identity, SystemClock};
pub use error::{Error, Result};
pub use graph::CommitInfo;
pub use index::{Index, IndexEntry};
pub use merge::MergeOutcome;
pub use object::{Object, ObjectKind};
pub use oid::ObjectId;
pub use protocol::RefAdvert;
pub use refs::{heads_ref, HeadState, RefStore};
pub use repo::Repository;
pub use status::{Change, ChangeKind, Status};
pub use store::ObjectStore;
pub use tree::TreeEntry;
pub use worktree::PathMap;
