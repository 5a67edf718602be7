//! Named-pointer storage for branches and the symbolic head.
//!
//! A ref is a file under the control directory holding a 40-hex commit
//! digest plus newline. `HEAD` is either a symbolic pointer
//! (`ref: refs/heads/<branch>\n`) or a detached digest. A symbolic `HEAD`
//! whose target ref file does not exist yet is an unborn branch: the state
//! immediately after init. All writes are atomic replaces.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::fsutil;
use crate::oid::ObjectId;

/// File name of the distinguished head reference.
pub const HEAD_FILE: &str = "HEAD";

/// Prefix marking a symbolic ref value.
pub const SYMBOLIC_PREFIX: &str = "ref: ";

/// Resolved state of `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// On a branch whose ref file exists.
    Symbolic(String),
    /// Directly at a commit.
    Detached(ObjectId),
    /// On a branch that has no commits yet.
    Unborn(String),
}

/// Full ref name for a branch: `refs/heads/<branch>`.
pub fn heads_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

/// Ref files rooted at a repository control directory.
pub struct RefStore {
    control_dir: PathBuf,
}

impl RefStore {
    pub fn new(control_dir: PathBuf) -> Self {
        Self { control_dir }
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.control_dir.join(name)
    }

    fn head_path(&self) -> PathBuf {
        self.control_dir.join(HEAD_FILE)
    }

    /// Read a ref by full name, returning its trimmed 40-hex content.
    pub fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.ref_path(name);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s.trim_end_matches(['\n', '\r']).to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create or overwrite a ref with a 40-hex digest.
    pub fn write(&self, name: &str, hex: &str) -> Result<()> {
        fsutil::write_atomic(&self.ref_path(name), format!("{hex}\n").as_bytes())
    }

    /// Read and classify `HEAD`. `None` means the file does not exist.
    pub fn head(&self) -> Result<Option<HeadState>> {
        let raw = match std::fs::read_to_string(self.head_path()) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let trimmed = raw.trim_end_matches(['\n', '\r']);
        if let Some(refname) = trimmed.strip_prefix(SYMBOLIC_PREFIX) {
            if self.ref_path(refname).exists() {
                Ok(Some(HeadState::Symbolic(refname.to_string())))
            } else {
                Ok(Some(HeadState::Unborn(refname.to_string())))
            }
        } else {
            let id = ObjectId::from_hex(trimmed)
                .map_err(|_| Error::Corrupt(format!("malformed HEAD: {trimmed:?}")))?;
            Ok(Some(HeadState::Detached(id)))
        }
    }

    /// Point `HEAD` at a branch ref.
    pub fn set_head_symbolic(&self, refname: &str) -> Result<()> {
        fsutil::write_atomic(
            &self.head_path(),
            format!("{SYMBOLIC_PREFIX}{refname}\n").as_bytes(),
        )
    }

    /// Point `HEAD` directly at a commit.
    pub fn set_head_detached(&self, id: &ObjectId) -> Result<()> {
        fsutil::write_atomic(&self.head_path(), format!("{}\n", id.to_hex()).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn refs(tmp: &TempDir) -> RefStore {
        RefStore::new(tmp.path().to_path_buf())
    }

    #[test]
    fn test_read_missing_ref() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(refs(&tmp).read("refs/heads/main").unwrap(), None);
    }

    #[test]
    fn test_write_read_ref() {
        let tmp = TempDir::new().unwrap();
        let refs = refs(&tmp);
        let hex = "ab".repeat(20);
        refs.write("refs/heads/master", &hex).unwrap();
        assert_eq!(refs.read("refs/heads/master").unwrap(), Some(hex.clone()));
        // on-disk content carries a trailing newline
        let raw = std::fs::read_to_string(tmp.path().join("refs/heads/master")).unwrap();
        assert_eq!(raw, format!("{hex}\n"));
    }

    #[test]
    fn test_head_unborn_then_symbolic() {
        let tmp = TempDir::new().unwrap();
        let refs = refs(&tmp);
        assert_eq!(refs.head().unwrap(), None);

        refs.set_head_symbolic("refs/heads/master").unwrap();
        assert_eq!(
            refs.head().unwrap(),
            Some(HeadState::Unborn("refs/heads/master".into()))
        );

        refs.write("refs/heads/master", &"cd".repeat(20)).unwrap();
        assert_eq!(
            refs.head().unwrap(),
            Some(HeadState::Symbolic("refs/heads/master".into()))
        );
    }

    #[test]
    fn test_head_detached() {
        let tmp = TempDir::new().unwrap();
        let refs = refs(&tmp);
        let id = ObjectId::from_data(b"some commit");
        refs.set_head_detached(&id).unwrap();
        assert_eq!(refs.head().unwrap(), Some(HeadState::Detached(id)));
    }

    #[test]
    fn test_heads_ref_name() {
        assert_eq!(heads_ref("feature"), "refs/heads/feature");
    }
}
