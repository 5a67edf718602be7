//! The commit graph: commit objects, ancestry, lowest common ancestor.
//!
//! A commit payload is a text header block followed by a blank line and the
//! free-form message. Headers, in order: one `tree`, zero or more `parent`
//! in insertion order, one `author`, one `committer`. The graph is acyclic
//! by construction (parents reference already-written commits), so every
//! traversal below terminates.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::object::ObjectKind;
use crate::oid::{HEX_LEN, ObjectId};
use crate::store::ObjectStore;

const TREE_PREFIX: &str = "tree ";
const PARENT_PREFIX: &str = "parent ";
const AUTHOR_PREFIX: &str = "author ";
const COMMITTER_PREFIX: &str = "committer ";

/// Parsed commit metadata.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: String,
    pub committer: String,
    pub message: String,
}

/// Serialize and store a commit object, returning its digest.
pub fn write_commit(
    store: &ObjectStore,
    tree: &ObjectId,
    parents: &[ObjectId],
    author: &str,
    committer: &str,
    message: &str,
) -> Result<ObjectId> {
    let mut text = String::new();
    text.push_str(TREE_PREFIX);
    text.push_str(&tree.to_hex());
    text.push('\n');
    for p in parents {
        text.push_str(PARENT_PREFIX);
        text.push_str(&p.to_hex());
        text.push('\n');
    }
    text.push_str(AUTHOR_PREFIX);
    text.push_str(author);
    text.push('\n');
    text.push_str(COMMITTER_PREFIX);
    text.push_str(committer);
    text.push_str("\n\n");
    text.push_str(message);

    store.write(ObjectKind::Commit, text.as_bytes())
}

/// Read and parse a commit object.
pub fn read_commit(store: &ObjectStore, id: &ObjectId) -> Result<CommitInfo> {
    let data = store.read_expected(id, ObjectKind::Commit)?;
    let text = std::str::from_utf8(&data)
        .map_err(|_| Error::Corrupt(format!("commit {} is not UTF-8", id.to_hex())))?;

    let (header, message) = match text.split_once("\n\n") {
        Some((h, m)) => (h, m.to_string()),
        None => (text, String::new()),
    };

    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = String::new();
    let mut committer = String::new();

    for line in header.lines() {
        if let Some(rest) = line.strip_prefix(TREE_PREFIX) {
            tree = Some(ObjectId::from_hex(rest.get(..HEX_LEN).unwrap_or(rest))?);
        } else if let Some(rest) = line.strip_prefix(PARENT_PREFIX) {
            parents.push(ObjectId::from_hex(rest.get(..HEX_LEN).unwrap_or(rest))?);
        } else if let Some(rest) = line.strip_prefix(AUTHOR_PREFIX) {
            author = rest.to_string();
        } else if let Some(rest) = line.strip_prefix(COMMITTER_PREFIX) {
            committer = rest.to_string();
        }
    }

    let tree = tree
        .ok_or_else(|| Error::Corrupt(format!("commit {} missing tree header", id.to_hex())))?;
    Ok(CommitInfo {
        tree,
        parents,
        author,
        committer,
        message,
    })
}

/// Is `ancestor` reachable from `descendant` by walking parents?
/// A commit is an ancestor of itself.
pub fn is_ancestor(store: &ObjectStore, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool> {
    if ancestor == descendant {
        return Ok(true);
    }
    let mut stack = vec![*descendant];
    let mut seen = HashSet::new();
    while let Some(cur) = stack.pop() {
        if !seen.insert(cur) {
            continue;
        }
        for p in read_commit(store, &cur)?.parents {
            if p == *ancestor {
                return Ok(true);
            }
            stack.push(p);
        }
    }
    Ok(false)
}

/// First ancestor of `x` encountered in a depth-first walk from `y`.
/// Returns one lowest common ancestor; when several exist the DFS order
/// picks which. `None` when the histories are unrelated.
pub fn lowest_common_ancestor(
    store: &ObjectStore,
    x: &ObjectId,
    y: &ObjectId,
) -> Result<Option<ObjectId>> {
    let mut ancestors = HashSet::new();
    let mut stack = vec![*x];
    while let Some(cur) = stack.pop() {
        if !ancestors.insert(cur) {
            continue;
        }
        stack.extend(read_commit(store, &cur)?.parents);
    }

    let mut seen = HashSet::new();
    let mut stack = vec![*y];
    while let Some(cur) = stack.pop() {
        if !seen.insert(cur) {
            continue;
        }
        if ancestors.contains(&cur) {
            return Ok(Some(cur));
        }
        stack.extend(read_commit(store, &cur)?.parents);
    }
    Ok(None)
}
