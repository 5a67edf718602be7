//! Three-way diff over {head-tree, index, working} snapshots.

use std::collections::BTreeSet;

use crate::worktree::PathMap;

/// How a path differs between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One classified difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: String,
}

/// Full status snapshot.
#[derive(Debug, Clone, Default)]
pub struct Status {
    /// HEAD tree vs index.
    pub staged: Vec<Change>,
    /// Index vs working tree. Working-only paths are untracked, not here.
    pub unstaged: Vec<Change>,
    /// Working paths absent from the index.
    pub untracked: Vec<String>,
}

impl Status {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.untracked.is_empty()
    }
}

/// Classify the three snapshots. With an unborn HEAD the head map is empty,
/// so every indexed path reports as staged-Added.
pub fn compute(head: &PathMap, index: &PathMap, working: &PathMap) -> Status {
    let mut st = Status::default();

    // staged = head vs index
    let all: BTreeSet<&String> = head.keys().chain(index.keys()).collect();
    for path in all {
        match (head.get(path), index.get(path)) {
            (Some(h), Some(i)) if h != i => st.staged.push(Change {
                kind: ChangeKind::Modified,
                path: path.clone(),
            }),
            (None, Some(_)) => st.staged.push(Change {
                kind: ChangeKind::Added,
                path: path.clone(),
            }),
            (Some(_), None) => st.staged.push(Change {
                kind: ChangeKind::Deleted,
                path: path.clone(),
            }),
            _ => {}
        }
    }

    // unstaged = index vs working; working-only paths fall through to untracked
    let all: BTreeSet<&String> = index.keys().chain(working.keys()).collect();
    for path in all {
        match (index.get(path), working.get(path)) {
            (Some(i), Some(w)) if i != w => st.unstaged.push(Change {
                kind: ChangeKind::Modified,
                path: path.clone(),
            }),
            (Some(_), None) => st.unstaged.push(Change {
                kind: ChangeKind::Deleted,
                path: path.clone(),
            }),
            _ => {}
        }
    }

    for path in working.keys() {
        if !index.contains_key(path) {
            st.untracked.push(path.clone());
        }
    }

    st
}
