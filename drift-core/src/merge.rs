//! Three-way merge with textual conflict emission.
//!
//! Merging giver into the current branch classifies each path against the
//! lowest common ancestor: identical on both sides is kept, a change on one
//! side only is taken, and a change on both sides is a conflict. Conflicted
//! paths get `<<<<<<<`/`=======`/`>>>>>>>` markers trimmed to the differing
//! middle region, and are excluded from the rewritten index so the user must
//! re-stage them after resolution. `MERGE_HEAD` records the giver tip from
//! just before ancestor classification until the merge commit is finalized.

use std::collections::BTreeSet;
use std::fs;

use tracing::debug;

use crate::error::{Error, Result};
use crate::fsutil;
use crate::graph;
use crate::object::ObjectKind;
use crate::oid::ObjectId;
use crate::refs::heads_ref;
use crate::repo::Repository;
use crate::worktree::{self, PathMap};

/// How a merge concluded when it did not conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Giver is already contained in the current branch.
    AlreadyUpToDate,
    /// Current branch advanced to the giver tip without a merge node.
    FastForward(ObjectId),
    /// A two-parent merge commit was created.
    Merged(ObjectId),
}

/// Merge `giver` into the current branch. Requires a symbolic HEAD; a giver
/// whose tip equals the current tip is rejected before any ancestry probing.
pub(crate) fn merge_branch(repo: &Repository, giver: &str) -> Result<MergeOutcome> {
    let cur_ref = repo
        .current_branch_ref()?
        .ok_or(Error::SymbolicHeadRequired)?;
    let refs = repo.refs();
    let cur_tip_hex = refs
        .read(&cur_ref)?
        .ok_or_else(|| Error::NotFound("current branch has no commits".into()))?;
    let cur_tip = ObjectId::from_hex(&cur_tip_hex)?;

    let giver_ref = heads_ref(giver);
    let giver_tip_hex = refs
        .read(&giver_ref)?
        .ok_or_else(|| Error::UnknownBranch(giver.to_string()))?;
    let giver_tip = ObjectId::from_hex(&giver_tip_hex)?;

    if giver_tip == cur_tip {
        return Err(Error::SelfMerge);
    }

    let store = repo.store();

    // An already-contained giver is a no-op.
    if graph::is_ancestor(&store, &giver_tip, &cur_tip)? {
        return Ok(MergeOutcome::AlreadyUpToDate);
    }
    if graph::is_ancestor(&store, &cur_tip, &giver_tip)? {
        let info = graph::read_commit(&store, &giver_tip)?;
        let target = worktree::tree_snapshot(&store, &info.tree)?;
        worktree::apply_snapshot(repo.root(), &store, &target)?;
        worktree::rewrite_index(repo.root(), &store, &target)?;
        refs.write(&cur_ref, &giver_tip.to_hex())?;
        debug!(branch = giver, tip = %giver_tip, "fast-forward merge");
        return Ok(MergeOutcome::FastForward(giver_tip));
    }

    repo.write_merge_head(&giver_tip)?;

    let base = graph::lowest_common_ancestor(&store, &cur_tip, &giver_tip)?
        .ok_or(Error::NoCommonAncestor)?;

    let ours_map = worktree::tree_snapshot(&store, &graph::read_commit(&store, &cur_tip)?.tree)?;
    let theirs_map =
        worktree::tree_snapshot(&store, &graph::read_commit(&store, &giver_tip)?.tree)?;
    let base_map = worktree::tree_snapshot(&store, &graph::read_commit(&store, &base)?.tree)?;

    let mut all: BTreeSet<&String> = BTreeSet::new();
    all.extend(ours_map.keys());
    all.extend(theirs_map.keys());
    all.extend(base_map.keys());

    let mut result: PathMap = ours_map.clone();
    let mut conflicts: Vec<String> = Vec::new();

    for path in all {
        let in_base = base_map.get(path);
        let in_ours = ours_map.get(path);
        let in_theirs = theirs_map.get(path);

        if in_ours == in_theirs {
            continue; // identical change, or untouched on both sides
        }
        if in_ours == in_base && in_theirs != in_base {
            // take theirs
            match in_theirs {
                None => {
                    result.remove(path);
                    fs::remove_file(repo.root().join(path))?;
                }
                Some(theirs_hex) => {
                    let id = ObjectId::from_hex(theirs_hex)?;
                    let bytes = store.read_expected(&id, ObjectKind::Blob)?;
                    fsutil::write_atomic(&repo.root().join(path), &bytes)?;
                    result.insert(path.clone(), theirs_hex.clone());
                }
            }
            continue;
        }
        if in_theirs == in_base && in_ours != in_base {
            continue; // keep ours
        }

        // both sides changed the path: conflict
        conflicts.push(path.clone());
        let ours_bytes = read_side(&store, in_ours)?;
        let theirs_bytes = read_side(&store, in_theirs)?;
        let merged = conflict_text(&ours_bytes, &theirs_bytes, giver);
        fsutil::write_atomic(&repo.root().join(path), &merged)?;
    }

    // Rewrite the index, excluding conflicted paths so the user must
    // re-stage them after resolution.
    let mut staged: PathMap = result.clone();
    for p in &conflicts {
        staged.remove(p);
    }
    worktree::rewrite_index(repo.root(), &store, &staged)?;

    if !conflicts.is_empty() {
        debug!(branch = giver, n = conflicts.len(), "merge stopped on conflicts");
        return Err(Error::ConflictsPresent { paths: conflicts });
    }

    let merge_commit =
        repo.commit_with_parents(&format!("Merge branch '{giver}'\n"), &[giver_tip])?;
    repo.clear_merge_head()?;
    debug!(branch = giver, commit = %merge_commit, "merge commit created");
    Ok(MergeOutcome::Merged(merge_commit))
}

fn read_side(store: &crate::store::ObjectStore, side: Option<&String>) -> Result<Vec<u8>> {
    match side {
        None => Ok(Vec::new()), // the side deleted the file
        Some(hex) => {
            let id = ObjectId::from_hex(hex)?;
            Ok(store.read_expected(&id, ObjectKind::Blob)?.to_vec())
        }
    }
}

/// Build marker-delimited conflict content. The common prefix and suffix of
/// the two line sequences are emitted verbatim; only the differing middle is
/// wrapped in markers. Every emitted line ends with `\n`.
pub fn conflict_text(ours: &[u8], theirs: &[u8], giver_label: &str) -> Vec<u8> {
    let a = split_byte_lines(ours);
    let b = split_byte_lines(theirs);

    let mut prefix = 0;
    while prefix < a.len() && prefix < b.len() && a[prefix] == b[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < a.len() - prefix
        && suffix < b.len() - prefix
        && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix]
    {
        suffix += 1;
    }

    fn push_line(line: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(line);
        out.push(b'\n');
    }

    let mut out = Vec::new();
    for line in &a[..prefix] {
        push_line(line, &mut out);
    }
    out.extend_from_slice(b"<<<<<<< HEAD\n");
    for line in &a[prefix..a.len() - suffix] {
        push_line(line, &mut out);
    }
    out.extend_from_slice(b"=======\n");
    for line in &b[prefix..b.len() - suffix] {
        push_line(line, &mut out);
    }
    out.extend_from_slice(b">>>>>>> ");
    out.extend_from_slice(giver_label.as_bytes());
    out.push(b'\n');
    for line in &a[a.len() - suffix..] {
        push_line(line, &mut out);
    }
    out
}

/// Byte-level line split: `\n` delimits, `\r` is dropped, a final unterminated
/// line is included. Binary content goes through the same path.
fn split_byte_lines(data: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut cur = Vec::new();
    for &b in data {
        match b {
            b'\n' => out.push(std::mem::take(&mut cur)),
            b'\r' => {}
            _ => cur.push(b),
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}
