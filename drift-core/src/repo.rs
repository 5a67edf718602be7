//! Repository facade: user-level operations over the core components.
//!
//! The facade owns the repository root, wires the object store, refs, index,
//! worktree, merge, diff, and sync layers together, and enforces the
//! user-visible preconditions (repo initialized, clean tree for checkout,
//! symbolic HEAD for push and merge). Each operation either completes with
//! its side effects persisted or leaves the repository as it was, except a
//! conflicting merge, which deliberately persists `MERGE_HEAD`, the marked
//! working files, and the partial index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{self, Clock, Identity, SystemClock};
use crate::diff;
use crate::error::{Error, Result};
use crate::graph::{self, CommitInfo};
use crate::index::Index;
use crate::merge::{self, MergeOutcome};
use crate::object::ObjectKind;
use crate::oid::{looks_hex40, ObjectId};
use crate::protocol::{RefAdvert, DETACHED};
use crate::refs::{heads_ref, HeadState, RefStore};
use crate::remote::{self, RemoteTarget};
use crate::status::{self, Status};
use crate::store::ObjectStore;
use crate::tree::{self, MODE_FILE};
use crate::worktree::{self, PathMap};

/// Name of the control directory at the repository root.
pub const CONTROL_DIR: &str = ".drift";

/// Branch a fresh repository starts on.
pub const DEFAULT_BRANCH: &str = "master";

/// Marker file recording the giver tip of an in-progress merge.
pub const MERGE_HEAD_FILE: &str = "MERGE_HEAD";

/// Temporary branch ref used to merge a fetched tip during pull.
const PULL_TMP_BRANCH: &str = ".pull_merge_tmp";

/// A drift repository rooted at a working-tree directory.
pub struct Repository {
    root: PathBuf,
    clock: Box<dyn Clock>,
}

impl Repository {
    /// Open a repository handle. No validation happens here; operations
    /// check [`Repository::is_initialized`] as their precondition.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Box::new(SystemClock),
        }
    }

    /// Open with an injected clock (tests, deterministic tooling).
    pub fn with_clock(root: impl Into<PathBuf>, clock: Box<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    // ==================== Paths ====================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    pub fn store(&self) -> ObjectStore {
        ObjectStore::new(self.control_dir())
    }

    pub fn refs(&self) -> RefStore {
        RefStore::new(self.control_dir())
    }

    pub fn is_initialized(&self) -> bool {
        self.control_dir().exists()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized(self.root.display().to_string()))
        }
    }

    // ==================== Init ====================

    /// Create the control directory skeleton, point HEAD at the unborn
    /// default branch, and persist the identity.
    pub fn init(&self, identity: &Identity) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::AlreadyExists(
                self.control_dir().display().to_string(),
            ));
        }
        std::fs::create_dir_all(self.store().objects_dir())?;
        std::fs::create_dir_all(self.control_dir().join("refs/heads"))?;
        std::fs::create_dir_all(self.control_dir().join("refs/tags"))?;
        self.refs().set_head_symbolic(&heads_ref(DEFAULT_BRANCH))?;
        config::save_identity(&self.control_dir(), identity)?;
        info!(root = %self.root.display(), "initialized repository");
        Ok(())
    }

    // ==================== Head resolution ====================

    /// Full ref name of the current branch, if HEAD is on one (born or not).
    pub fn current_branch_ref(&self) -> Result<Option<String>> {
        Ok(match self.refs().head()? {
            Some(HeadState::Symbolic(rn)) | Some(HeadState::Unborn(rn)) => Some(rn),
            _ => None,
        })
    }

    /// The commit HEAD resolves to, if any.
    pub fn head_commit(&self) -> Result<Option<ObjectId>> {
        match self.refs().head()? {
            Some(HeadState::Detached(id)) => Ok(Some(id)),
            Some(HeadState::Symbolic(rn)) => match self.refs().read(&rn)? {
                Some(hex) => Ok(Some(ObjectId::from_hex(&hex)?)),
                None => Ok(None),
            },
            Some(HeadState::Unborn(_)) | None => Ok(None),
        }
    }

    // ==================== Merge state ====================

    pub fn read_merge_head(&self) -> Result<Option<ObjectId>> {
        let raw = match std::fs::read_to_string(self.control_dir().join(MERGE_HEAD_FILE)) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let trimmed = raw.trim_end_matches(['\n', '\r']);
        if looks_hex40(trimmed) {
            Ok(Some(ObjectId::from_hex(trimmed)?))
        } else {
            Ok(None)
        }
    }

    pub(crate) fn write_merge_head(&self, id: &ObjectId) -> Result<()> {
        crate::fsutil::write_atomic(
            &self.control_dir().join(MERGE_HEAD_FILE),
            format!("{}\n", id.to_hex()).as_bytes(),
        )
    }

    pub(crate) fn clear_merge_head(&self) -> Result<()> {
        match std::fs::remove_file(self.control_dir().join(MERGE_HEAD_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // ==================== Staging ====================

    /// Stage working files into the index, writing their blobs.
    pub fn stage(&self, paths: &[String]) -> Result<()> {
        self.ensure_initialized()?;
        let store = self.store();
        let mut idx = Index::open(self.root.clone())?;
        for path in paths {
            idx.stage(&store, path, MODE_FILE)?;
        }
        idx.save()
    }

    /// Drop paths from the index. Missing paths are silent no-ops.
    pub fn unstage(&self, paths: &[String]) -> Result<()> {
        self.ensure_initialized()?;
        let mut idx = Index::open(self.root.clone())?;
        for path in paths {
            idx.unstage(path);
        }
        idx.save()
    }

    // ==================== Commits ====================

    /// Freeze the index into a tree and commit it. When `MERGE_HEAD` exists
    /// it becomes an additional parent, and the commit is refused while
    /// unresolved paths remain.
    pub fn commit(&self, message: &str) -> Result<ObjectId> {
        self.ensure_initialized()?;
        let store = self.store();
        let idx = Index::open(self.root.clone())?;
        let tree = tree::write_tree_from_index(&store, idx.entries())?;

        let mut parents = Vec::new();
        if let Some(tip) = self.head_commit()? {
            parents.push(tip);
        }

        let merge_head = self.read_merge_head()?;
        if let Some(mh) = merge_head {
            if !parents.contains(&mh) {
                parents.push(mh);
            }
            let st = self.status()?;
            if !st.unstaged.is_empty() || !st.untracked.is_empty() {
                return Err(Error::MergeInProgress("unresolved paths present".into()));
            }
        }

        let id = self.finish_commit(&store, &tree, &parents, message)?;
        if merge_head.is_some() {
            self.clear_merge_head()?;
        }
        Ok(id)
    }

    /// Commit the index with explicitly supplied extra parents. Used by the
    /// merge engine to finalize a two-parent merge; carries no `MERGE_HEAD`
    /// handling of its own.
    pub(crate) fn commit_with_parents(
        &self,
        message: &str,
        extra_parents: &[ObjectId],
    ) -> Result<ObjectId> {
        self.ensure_initialized()?;
        let store = self.store();
        let idx = Index::open(self.root.clone())?;
        let tree = tree::write_tree_from_index(&store, idx.entries())?;

        let mut parents = Vec::new();
        if let Some(tip) = self.head_commit()? {
            parents.push(tip);
        }
        parents.extend_from_slice(extra_parents);

        self.finish_commit(&store, &tree, &parents, message)
    }

    fn finish_commit(
        &self,
        store: &ObjectStore,
        tree: &ObjectId,
        parents: &[ObjectId],
        message: &str,
    ) -> Result<ObjectId> {
        let identity = config::load_identity(&self.control_dir())?;
        let (secs, tz_minutes) = self.clock.now();
        let signature = config::make_signature(&identity, secs, tz_minutes);

        let id = graph::write_commit(store, tree, parents, &signature, &signature, message)?;

        match self.refs().head()? {
            Some(HeadState::Symbolic(rn)) | Some(HeadState::Unborn(rn)) => {
                self.refs().write(&rn, &id.to_hex())?;
            }
            _ => self.refs().set_head_detached(&id)?,
        }
        debug!(commit = %id, parents = parents.len(), "created commit");
        Ok(id)
    }

    // ==================== Status and diff ====================

    /// Three-way status over {HEAD tree, index, working tree}.
    pub fn status(&self) -> Result<Status> {
        self.ensure_initialized()?;
        let store = self.store();
        let head_map = match self.head_commit()? {
            Some(id) => worktree::tree_snapshot(&store, &graph::read_commit(&store, &id)?.tree)?,
            None => PathMap::new(),
        };
        let index_map = Index::open(self.root.clone())?.snapshot();
        let working_map = worktree::working_snapshot(&self.root)?;
        Ok(status::compute(&head_map, &index_map, &working_map))
    }

    /// Unified diffs for every differing path: working vs index, or with
    /// `cached`, index vs HEAD tree. Missing sides diff as empty.
    pub fn diff(&self, cached: bool) -> Result<String> {
        self.ensure_initialized()?;
        let store = self.store();

        let (left, right) = if cached {
            let head = match self.head_commit()? {
                Some(id) => {
                    worktree::tree_snapshot(&store, &graph::read_commit(&store, &id)?.tree)?
                }
                None => PathMap::new(),
            };
            (head, Index::open(self.root.clone())?.snapshot())
        } else {
            (
                Index::open(self.root.clone())?.snapshot(),
                worktree::working_snapshot(&self.root)?,
            )
        };

        let mut out = String::new();
        let all: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
        for path in all {
            let l = left.get(path);
            let r = right.get(path);
            if l == r {
                continue;
            }
            let a = match l {
                Some(hex) => self.blob_lines(&store, hex)?,
                None => Vec::new(),
            };
            let b = match r {
                Some(hex) if cached => self.blob_lines(&store, hex)?,
                Some(_) => {
                    let bytes = std::fs::read(self.root.join(path))?;
                    diff::split_lines(&String::from_utf8_lossy(&bytes))
                }
                None => Vec::new(),
            };
            out.push_str(&diff::unified(&a, &b, path));
        }
        Ok(out)
    }

    fn blob_lines(&self, store: &ObjectStore, hex: &str) -> Result<Vec<String>> {
        let id = ObjectId::from_hex(hex)?;
        let bytes = store.read_expected(&id, ObjectKind::Blob)?;
        Ok(diff::split_lines(&String::from_utf8_lossy(&bytes)))
    }

    // ==================== Branches and checkout ====================

    /// Point a new branch ref at the current HEAD commit.
    pub fn branch_create(&self, name: &str) -> Result<ObjectId> {
        self.ensure_initialized()?;
        let tip = self
            .head_commit()?
            .ok_or_else(|| Error::NotFound("HEAD has no commits".into()))?;
        let refname = heads_ref(name);
        if self.refs().read(&refname)?.is_some() {
            return Err(Error::AlreadyExists(refname));
        }
        self.refs().write(&refname, &tip.to_hex())?;
        Ok(tip)
    }

    /// Switch to a branch name or a 40-hex commit. Refuses to clobber a
    /// working tree that differs from the index.
    pub fn checkout(&self, target: &str) -> Result<()> {
        self.ensure_initialized()?;

        let working = worktree::working_snapshot(&self.root)?;
        let index = Index::open(self.root.clone())?.snapshot();
        if working != index {
            return Err(Error::DirtyWorkingTree(
                "working tree differs from index".into(),
            ));
        }

        let (commit, branch_ref) = if looks_hex40(target) {
            (ObjectId::from_hex(target)?, None)
        } else {
            let refname = heads_ref(target);
            let hex = self
                .refs()
                .read(&refname)?
                .ok_or_else(|| Error::UnknownBranch(target.to_string()))?;
            (ObjectId::from_hex(&hex)?, Some(refname))
        };

        let store = self.store();
        let info = graph::read_commit(&store, &commit)?;
        let snapshot = worktree::tree_snapshot(&store, &info.tree)?;
        worktree::apply_snapshot(&self.root, &store, &snapshot)?;
        worktree::rewrite_index(&self.root, &store, &snapshot)?;

        match branch_ref {
            Some(rn) => self.refs().set_head_symbolic(&rn)?,
            None => self.refs().set_head_detached(&commit)?,
        }
        info!(target, "checked out");
        Ok(())
    }

    // ==================== Merge ====================

    /// Merge a branch into the current one. See [`crate::merge`].
    pub fn merge(&self, branch: &str) -> Result<MergeOutcome> {
        self.ensure_initialized()?;
        merge::merge_branch(self, branch)
    }

    // ==================== History ====================

    /// Walk from HEAD along first parents, newest first.
    pub fn log(&self, limit: Option<usize>) -> Result<Vec<(ObjectId, CommitInfo)>> {
        self.ensure_initialized()?;
        let store = self.store();
        let mut out = Vec::new();
        let mut cursor = self.head_commit()?;
        while let Some(id) = cursor {
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }
            let info = graph::read_commit(&store, &id)?;
            cursor = info.parents.first().copied();
            out.push((id, info));
        }
        Ok(out)
    }

    // ==================== Remotes ====================

    /// Clone `source` (path or `tcp://`) into `dest`.
    pub fn clone_from(source: &str, dest: &Path) -> Result<()> {
        match remote::parse_remote(source) {
            RemoteTarget::Tcp { host, port } => remote::clone_tcp(&host, port, dest),
            RemoteTarget::Path(p) => remote::clone_local(&p, dest),
        }
    }

    /// Push a branch to a remote, fast-forward only.
    pub fn push(&self, remote_spec: &str, branch: &str) -> Result<()> {
        self.ensure_initialized()?;
        match remote::parse_remote(remote_spec) {
            RemoteTarget::Tcp { host, port } => remote::push_tcp(&host, port, &self.root, branch),
            RemoteTarget::Path(p) => remote::push_local(&self.root, &p, branch),
        }
    }

    /// Fetch a remote's head, recording `refs/remotes/<name>/<branch>`.
    pub fn fetch(&self, remote_spec: &str, name: &str) -> Result<RefAdvert> {
        self.ensure_initialized()?;
        match remote::parse_remote(remote_spec) {
            RemoteTarget::Tcp { host, port } => remote::fetch_tcp(&host, port, &self.root, name),
            RemoteTarget::Path(p) => remote::fetch_local(&self.root, &p, name),
        }
    }

    /// Fetch, then fast-forward when possible, otherwise merge the fetched
    /// tip through a temporary branch ref.
    pub fn pull(&self, remote_spec: &str, name: &str) -> Result<MergeOutcome> {
        self.ensure_initialized()?;
        let cur_ref = self
            .current_branch_ref()?
            .ok_or(Error::SymbolicHeadRequired)?;

        let advert = self.fetch(remote_spec, name)?;
        let fetched = match (advert.branch.as_str(), advert.tip) {
            (DETACHED, _) | (_, None) => {
                return Err(Error::ProtocolError(
                    "remote HEAD is detached or empty".into(),
                ));
            }
            (_, Some(tip)) => tip,
        };

        let local_tip_hex = self
            .refs()
            .read(&cur_ref)?
            .ok_or_else(|| Error::NotFound("current branch has no commits".into()))?;
        let local_tip = ObjectId::from_hex(&local_tip_hex)?;

        let store = self.store();
        if graph::is_ancestor(&store, &local_tip, &fetched)? {
            let info = graph::read_commit(&store, &fetched)?;
            let snapshot = worktree::tree_snapshot(&store, &info.tree)?;
            worktree::apply_snapshot(&self.root, &store, &snapshot)?;
            worktree::rewrite_index(&self.root, &store, &snapshot)?;
            self.refs().write(&cur_ref, &fetched.to_hex())?;
            info!(name, tip = %fetched, "pull fast-forwarded");
            return Ok(MergeOutcome::FastForward(fetched));
        }

        self.refs()
            .write(&heads_ref(PULL_TMP_BRANCH), &fetched.to_hex())?;
        let outcome = merge::merge_branch(self, PULL_TMP_BRANCH);
        let _ = std::fs::remove_file(self.control_dir().join(heads_ref(PULL_TMP_BRANCH)));
        outcome
    }
}
