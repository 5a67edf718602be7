//! Filesystem helpers: atomic replace and recursive enumeration.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Create the parent directory chain of `path` if missing.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write `data` to `path` atomically: write a temp sibling, then rename over.
/// A crash leaves either the old content or the new, never a partial file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Recursively list every regular file under `dir`.
pub fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            files.extend(walk_files(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("a/b/c.txt");
        write_atomic(&target, b"data").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"data");
    }

    #[test]
    fn test_write_atomic_replaces() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("f");
        write_atomic(&target, b"one").unwrap();
        write_atomic(&target, b"two").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"two");
    }

    #[test]
    fn test_walk_files() {
        let tmp = TempDir::new().unwrap();
        write_atomic(&tmp.path().join("x"), b"").unwrap();
        write_atomic(&tmp.path().join("d/y"), b"").unwrap();
        write_atomic(&tmp.path().join("d/e/z"), b"").unwrap();
        let mut names: Vec<_> = walk_files(tmp.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["x", "y", "z"]);
    }

    #[test]
    fn test_walk_files_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(walk_files(&tmp.path().join("nope")).unwrap().is_empty());
    }
}
