//! Content-addressed object store.
//!
//! Objects live under `objects/<first-2-hex>/<remaining-38-hex>` inside the
//! control directory, zlib-compressed in their framed form. The fan-out
//! bounds the number of entries per directory. Writes are idempotent: a
//! digest that already has a file is left untouched, so concurrent writers
//! producing the same content collide benignly.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::compress;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::object::{self, Object, ObjectKind};
use crate::oid::ObjectId;

/// Directory name for the fan-out store inside the control directory.
pub const OBJECTS_DIR: &str = "objects";

/// Loose-object store rooted at a repository control directory.
pub struct ObjectStore {
    control_dir: PathBuf,
}

impl ObjectStore {
    pub fn new(control_dir: PathBuf) -> Self {
        Self { control_dir }
    }

    /// Root of the fan-out tree.
    pub fn objects_dir(&self) -> PathBuf {
        self.control_dir.join(OBJECTS_DIR)
    }

    /// Filesystem path for a digest.
    pub fn path_for(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.objects_dir().join(&hex[..2]).join(&hex[2..])
    }

    /// Write an object, returning its digest. Writing identical content
    /// twice is a no-op.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
        let framed = object::frame(kind, payload);
        let id = ObjectId::from_data(&framed);
        let path = self.path_for(&id);
        if !path.exists() {
            let compressed = compress::deflate(&framed)?;
            fsutil::write_atomic(&path, &compressed)?;
        }
        Ok(id)
    }

    /// Read an object back as kind and payload.
    pub fn read(&self, id: &ObjectId) -> Result<Object> {
        let path = self.path_for(id);
        let compressed = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::missing_object(id));
            }
            Err(e) => return Err(e.into()),
        };
        let framed = compress::inflate(&compressed)?;
        object::parse_frame(&framed)
    }

    /// Read an object and require it to be of the given kind.
    pub fn read_expected(&self, id: &ObjectId, kind: ObjectKind) -> Result<Bytes> {
        let obj = self.read(id)?;
        if obj.kind != kind {
            return Err(Error::Corrupt(format!(
                "object {} is a {}, expected {}",
                id.to_hex(),
                obj.kind,
                kind
            )));
        }
        Ok(obj.data)
    }

    /// Does the store already hold this digest?
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.path_for(id).exists()
    }
}

/// Fan-out path for a 40-hex digest under an arbitrary objects directory.
/// Used by the sync protocol, which addresses files before a store exists.
pub fn fanout_path(objects_dir: &Path, hex: &str) -> PathBuf {
    objects_dir.join(&hex[..2]).join(&hex[2..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> ObjectStore {
        ObjectStore::new(tmp.path().to_path_buf())
    }

    #[test]
    fn test_write_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let id = store.write(ObjectKind::Blob, b"hello\n").unwrap();
        let obj = store.read(&id).unwrap();
        assert_eq!(obj.kind, ObjectKind::Blob);
        assert_eq!(obj.data.as_ref(), b"hello\n");
    }

    #[test]
    fn test_write_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let a = store.write(ObjectKind::Blob, b"same").unwrap();
        let mtime = std::fs::metadata(store.path_for(&a)).unwrap().modified().unwrap();
        let b = store.write(ObjectKind::Blob, b"same").unwrap();
        assert_eq!(a, b);
        // second write left the original file in place
        assert_eq!(
            std::fs::metadata(store.path_for(&a)).unwrap().modified().unwrap(),
            mtime
        );
    }

    #[test]
    fn test_fanout_layout() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let id = store.write(ObjectKind::Blob, b"x").unwrap();
        let hex = id.to_hex();
        let path = store.path_for(&id);
        assert!(path.ends_with(Path::new(&hex[..2]).join(&hex[2..])));
        assert!(path.exists());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let id = ObjectId::from_data(b"never written");
        assert!(matches!(store.read(&id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_read_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let id = store.write(ObjectKind::Blob, b"payload").unwrap();
        std::fs::write(store.path_for(&id), b"not zlib at all").unwrap();
        assert!(matches!(store.read(&id), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_read_expected_kind_mismatch() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let id = store.write(ObjectKind::Blob, b"data").unwrap();
        assert!(store.read_expected(&id, ObjectKind::Blob).is_ok());
        assert!(matches!(
            store.read_expected(&id, ObjectKind::Tree),
            Err(Error::Corrupt(_))
        ));
    }
}
