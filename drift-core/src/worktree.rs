//! Working-tree enumeration and snapshot reconciliation.
//!
//! A snapshot is a `path -> hex-digest` map. Three producers exist (the
//! working tree, the index, and a tree object) and checkout/merge/sync all
//! reduce to applying one snapshot on top of another.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::fsutil;
use crate::index::Index;
use crate::object::{self, ObjectKind};
use crate::oid::ObjectId;
use crate::repo::CONTROL_DIR;
use crate::store::ObjectStore;
use crate::tree::{self, MODE_FILE, MODE_TREE};

/// Mapping of repo-relative path to 40-hex blob digest.
pub type PathMap = BTreeMap<String, String>;

/// Enumerate regular files under `root`, excluding the control directory,
/// as forward-slash repo-relative paths.
pub fn enumerate(root: &Path) -> Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    walk(root, root, &mut out)?;
    Ok(out)
}

fn walk(dir: &Path, root: &Path, out: &mut BTreeSet<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if entry.file_name() == CONTROL_DIR {
                continue;
            }
            walk(&entry.path(), root, out)?;
        } else if file_type.is_file() {
            out.insert(relative_path(&entry.path(), root));
        }
    }
    Ok(())
}

fn relative_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Hash every working file as a blob without writing to the store.
pub fn working_snapshot(root: &Path) -> Result<PathMap> {
    let mut map = PathMap::new();
    for rel in enumerate(root)? {
        let bytes = fs::read(root.join(&rel))?;
        map.insert(rel, object::id_for(ObjectKind::Blob, &bytes).to_hex());
    }
    Ok(map)
}

/// Flatten a tree object into a snapshot, joining names with `/`.
pub fn tree_snapshot(store: &ObjectStore, tree_id: &ObjectId) -> Result<PathMap> {
    let mut map = PathMap::new();
    collect_tree(store, tree_id, "", &mut map)?;
    Ok(map)
}

fn collect_tree(store: &ObjectStore, id: &ObjectId, prefix: &str, out: &mut PathMap) -> Result<()> {
    for entry in tree::read_tree(store, id)? {
        if entry.mode == MODE_TREE {
            collect_tree(store, &entry.id, &format!("{prefix}{}/", entry.name), out)?;
        } else {
            out.insert(format!("{prefix}{}", entry.name), entry.id.to_hex());
        }
    }
    Ok(())
}

/// Make the working tree match `target`: delete files not listed, then
/// write every listed blob. File writes are atomic; directories emptied by
/// deletion are left in place.
pub fn apply_snapshot(root: &Path, store: &ObjectStore, target: &PathMap) -> Result<()> {
    for path in enumerate(root)? {
        if !target.contains_key(&path) {
            fs::remove_file(root.join(&path))?;
        }
    }
    for (path, hex) in target {
        let id = ObjectId::from_hex(hex)?;
        let bytes = store.read_expected(&id, ObjectKind::Blob)?;
        fsutil::write_atomic(&root.join(path), &bytes)?;
    }
    Ok(())
}

/// Discard the index and rebuild it as if each path in `target` were staged
/// from the working tree.
pub fn rewrite_index(root: &Path, store: &ObjectStore, target: &PathMap) -> Result<()> {
    let mut idx = Index::empty(root.to_path_buf());
    for path in target.keys() {
        idx.stage(store, path, MODE_FILE)?;
    }
    idx.save()
}
