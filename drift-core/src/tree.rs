//! Tree objects: directory-level mappings of name to (mode, digest).
//!
//! A tree payload is the concatenation of entries
//! `"<mode-octal> <name>\0<20-byte-digest>"`, serialized in lexicographic
//! name order so that identical entry sets always hash identically. Names
//! contain no `/` or NUL. Files and subtrees share one name space.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::index::IndexEntry;
use crate::object::ObjectKind;
use crate::oid::{ObjectId, RAW_LEN};
use crate::store::ObjectStore;

/// Mode of a regular file entry.
pub const MODE_FILE: u32 = 0o100644;

/// Mode of a subtree entry.
pub const MODE_TREE: u32 = 0o40000;

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    pub name: String,
    pub id: ObjectId,
}

/// Render a mode as ASCII octal (no leading zero).
pub fn mode_to_octal(mode: u32) -> String {
    format!("{mode:o}")
}

/// Parse ASCII octal into a mode. Stops at the first non-octal digit.
pub fn octal_to_mode(s: &str) -> u32 {
    let mut v = 0u32;
    for b in s.bytes() {
        if !(b'0'..=b'7').contains(&b) {
            break;
        }
        v = (v << 3) + u32::from(b - b'0');
    }
    v
}

/// Serialize entries into a tree payload, sorting by name.
pub fn encode(entries: &[TreeEntry]) -> Vec<u8> {
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut data = Vec::new();
    for e in sorted {
        data.extend_from_slice(mode_to_octal(e.mode).as_bytes());
        data.push(b' ');
        data.extend_from_slice(e.name.as_bytes());
        data.push(0);
        data.extend_from_slice(e.id.as_bytes());
    }
    data
}

/// Parse a tree payload back into entries.
pub fn decode(data: &[u8]) -> Result<Vec<TreeEntry>> {
    let mut out = Vec::new();
    let mut p = 0;
    while p < data.len() {
        let space = data[p..]
            .iter()
            .position(|&b| b == b' ')
            .map(|i| i + p)
            .ok_or_else(|| Error::Corrupt("tree entry missing space".into()))?;
        let mode_str = std::str::from_utf8(&data[p..space])
            .map_err(|_| Error::Corrupt("tree mode is not ASCII".into()))?;
        let mode = octal_to_mode(mode_str);

        let nul = data[space + 1..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| i + space + 1)
            .ok_or_else(|| Error::Corrupt("tree entry missing NUL".into()))?;
        let name = std::str::from_utf8(&data[space + 1..nul])
            .map_err(|_| Error::Corrupt("tree entry name is not UTF-8".into()))?
            .to_string();

        let id_end = nul + 1 + RAW_LEN;
        if id_end > data.len() {
            return Err(Error::Corrupt("tree entry truncated digest".into()));
        }
        let mut raw = [0u8; RAW_LEN];
        raw.copy_from_slice(&data[nul + 1..id_end]);
        out.push(TreeEntry {
            mode,
            name,
            id: ObjectId::new(raw),
        });
        p = id_end;
    }
    Ok(out)
}

/// Write a tree object from entries, returning its digest.
pub fn write_tree(store: &ObjectStore, entries: &[TreeEntry]) -> Result<ObjectId> {
    store.write(ObjectKind::Tree, &encode(entries))
}

/// Read and parse a tree object.
pub fn read_tree(store: &ObjectStore, id: &ObjectId) -> Result<Vec<TreeEntry>> {
    let data = store.read_expected(id, ObjectKind::Tree)?;
    decode(&data)
}

/// Build a root tree from the flat index by recursive grouping on the first
/// path segment. Leaves become file entries; each group becomes a subtree.
pub fn write_tree_from_index(store: &ObjectStore, entries: &[IndexEntry]) -> Result<ObjectId> {
    let group: Vec<(String, u32, ObjectId)> = entries
        .iter()
        .map(|e| (e.path.clone(), e.mode, e.id))
        .collect();
    build_group(store, group)
}

fn build_group(store: &ObjectStore, group: Vec<(String, u32, ObjectId)>) -> Result<ObjectId> {
    let mut tree_entries = Vec::new();
    let mut subdirs: BTreeMap<String, Vec<(String, u32, ObjectId)>> = BTreeMap::new();

    for (path, mode, id) in group {
        match path.split_once('/') {
            None => tree_entries.push(TreeEntry {
                mode,
                name: path,
                id,
            }),
            Some((first, rest)) => subdirs
                .entry(first.to_string())
                .or_default()
                .push((rest.to_string(), mode, id)),
        }
    }

    for (dirname, children) in subdirs {
        let subtree = build_group(store, children)?;
        tree_entries.push(TreeEntry {
            mode: MODE_TREE,
            name: dirname,
            id: subtree,
        });
    }

    write_tree(store, &tree_entries)
}
