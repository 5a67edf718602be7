//! The staging index: an ordered list of `(mode, digest, path)` entries.
//!
//! Paths are repo-relative, forward-slash separated, and unique. The on-disk
//! format is one line per entry, `"<mode-octal> <hex-digest> <path>"`.
//! Loading is lenient: malformed lines are skipped so a damaged index
//! degrades instead of wedging the repository. Saving rewrites the whole
//! file atomically, sorted by path.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::fsutil;
use crate::object::ObjectKind;
use crate::oid::{looks_hex40, ObjectId};
use crate::repo::CONTROL_DIR;
use crate::store::ObjectStore;
use crate::tree::{mode_to_octal, octal_to_mode};

/// File name of the index inside the control directory.
pub const INDEX_FILE: &str = "index";

/// One staged path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub mode: u32,
    pub id: ObjectId,
    pub path: String,
}

/// The staging index of a repository.
pub struct Index {
    root: PathBuf,
    entries: Vec<IndexEntry>,
}

impl Index {
    /// Open the index of the repository at `root`, loading existing entries.
    pub fn open(root: PathBuf) -> Result<Self> {
        let mut idx = Self::empty(root);
        idx.load()?;
        Ok(idx)
    }

    /// An empty index for `root`, ignoring anything on disk.
    pub fn empty(root: PathBuf) -> Self {
        Self {
            root,
            entries: Vec::new(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(CONTROL_DIR).join(INDEX_FILE)
    }

    /// Parse the on-disk index if present. Missing file means empty.
    pub fn load(&mut self) -> Result<()> {
        self.entries.clear();
        let text = match std::fs::read_to_string(self.index_path()) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // format: "<octal> <hex> <path>"; skip anything malformed
            let mut parts = line.splitn(3, ' ');
            let (Some(mode_str), Some(hex), Some(path)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let mode = octal_to_mode(mode_str);
            let path = path.trim();
            if mode == 0 || path.is_empty() || !looks_hex40(hex) {
                continue;
            }
            let Ok(id) = ObjectId::from_hex(hex) else {
                continue;
            };
            self.entries.push(IndexEntry {
                mode,
                id,
                path: path.to_string(),
            });
        }
        self.entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(())
    }

    /// Atomically rewrite the index, entries sorted by path.
    pub fn save(&self) -> Result<()> {
        let mut text = String::new();
        for e in &self.entries {
            text.push_str(&mode_to_octal(e.mode));
            text.push(' ');
            text.push_str(&e.id.to_hex());
            text.push(' ');
            text.push_str(&e.path);
            text.push('\n');
        }
        fsutil::write_atomic(&self.index_path(), text.as_bytes())
    }

    /// Read the working file at `rel`, write its blob, and upsert an entry.
    pub fn stage(&mut self, store: &ObjectStore, rel: &str, mode: u32) -> Result<ObjectId> {
        validate_rel_path(rel)?;
        self.check_name_space(rel)?;

        let bytes = match std::fs::read(self.root.join(rel)) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("no such file: {rel}")));
            }
            Err(e) => return Err(e.into()),
        };
        let id = store.write(ObjectKind::Blob, &bytes)?;

        if let Some(existing) = self.entries.iter_mut().find(|e| e.path == rel) {
            existing.mode = mode;
            existing.id = id;
        } else {
            self.entries.push(IndexEntry {
                mode,
                id,
                path: rel.to_string(),
            });
            self.entries.sort_by(|a, b| a.path.cmp(&b.path));
        }
        Ok(id)
    }

    /// Remove an entry by exact path. Silent no-op if absent.
    pub fn unstage(&mut self, rel: &str) {
        self.entries.retain(|e| e.path != rel);
    }

    /// Staged entries, sorted by path.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Mapping of path to hex digest, for snapshot comparison.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.path.clone(), e.id.to_hex()))
            .collect()
    }

    /// A file and a directory must not share a name at the same tree level;
    /// reject a stage that would make the index unbuildable as a tree.
    fn check_name_space(&self, rel: &str) -> Result<()> {
        for e in &self.entries {
            if e.path == rel {
                continue; // plain upsert
            }
            if e.path.starts_with(rel) && e.path.as_bytes().get(rel.len()) == Some(&b'/') {
                return Err(Error::AlreadyExists(format!(
                    "{rel} collides with staged entry {}",
                    e.path
                )));
            }
            if rel.starts_with(&e.path) && rel.as_bytes().get(e.path.len()) == Some(&b'/') {
                return Err(Error::AlreadyExists(format!(
                    "{rel} collides with staged entry {}",
                    e.path
                )));
            }
        }
        Ok(())
    }
}

/// Repo-relative paths only: no leading slash, no empty, `.` or `..` segments.
fn validate_rel_path(rel: &str) -> Result<()> {
    let bad = rel.is_empty()
        || rel.starts_with('/')
        || rel.contains('\0')
        || rel.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(Error::IoFailure(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid repository path: {rel:?}"),
        )));
    }
    Ok(())
}
