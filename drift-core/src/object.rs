//! Core object model: blobs, trees, commits.
//!
//! Objects are a closed tagged variant. The storage identity of an object is
//! the digest of its framed form `"<kind-tag> <payload-length>\0<payload>"`,
//! where the tag is the lowercase ASCII kind name and the length is decimal
//! ASCII. Equal payloads of equal kind therefore produce equal digests.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::oid::ObjectId;

/// Object type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    /// Lowercase ASCII tag used in the framed serialization
    pub fn tag(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    /// Parse a kind tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "blob" => Some(ObjectKind::Blob),
            "tree" => Some(ObjectKind::Tree),
            "commit" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A typed object payload as stored
#[derive(Debug, Clone)]
pub struct Object {
    pub kind: ObjectKind,
    pub data: Bytes,
}

/// Build the framed bytes that are hashed and stored: `"<kind> <len>\0" + payload`.
pub fn frame(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind.tag(), payload.len());
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Parse framed bytes back into kind and payload, validating the header.
pub fn parse_frame(bytes: &[u8]) -> Result<Object> {
    let space = bytes
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::Corrupt("object header missing space".into()))?;
    let nul = bytes[space + 1..]
        .iter()
        .position(|&b| b == 0)
        .map(|i| i + space + 1)
        .ok_or_else(|| Error::Corrupt("object header missing NUL".into()))?;

    let tag = std::str::from_utf8(&bytes[..space])
        .map_err(|_| Error::Corrupt("object kind is not ASCII".into()))?;
    let kind = ObjectKind::from_tag(tag)
        .ok_or_else(|| Error::Corrupt(format!("unknown object kind: {tag:?}")))?;

    let len_str = std::str::from_utf8(&bytes[space + 1..nul])
        .map_err(|_| Error::Corrupt("object length is not ASCII".into()))?;
    let declared: usize = len_str
        .parse()
        .map_err(|_| Error::Corrupt(format!("bad object length: {len_str:?}")))?;

    let payload = &bytes[nul + 1..];
    if payload.len() != declared {
        return Err(Error::Corrupt(format!(
            "object length mismatch: declared {declared}, got {}",
            payload.len()
        )));
    }
    Ok(Object {
        kind,
        data: Bytes::copy_from_slice(payload),
    })
}

/// Compute the storage identity of a payload without writing it anywhere.
pub fn id_for(kind: ObjectKind, payload: &[u8]) -> ObjectId {
    ObjectId::from_data(&frame(kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let framed = frame(ObjectKind::Blob, b"hello\n");
        assert_eq!(&framed, b"blob 6\0hello\n");
    }

    #[test]
    fn test_frame_parse_roundtrip() {
        for kind in [ObjectKind::Blob, ObjectKind::Tree, ObjectKind::Commit] {
            let obj = parse_frame(&frame(kind, b"payload bytes")).unwrap();
            assert_eq!(obj.kind, kind);
            assert_eq!(obj.data.as_ref(), b"payload bytes");
        }
    }

    #[test]
    fn test_parse_rejects_malformed_header() {
        assert!(parse_frame(b"blob6\0x").is_err());
        assert!(parse_frame(b"blob 1x").is_err());
        assert!(parse_frame(b"sock 1\0x").is_err());
        assert!(parse_frame(b"blob one\0x").is_err());
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        assert!(parse_frame(b"blob 4\0abc").is_err());
        assert!(parse_frame(b"blob 2\0abc").is_err());
    }

    #[test]
    fn test_id_is_content_addressed() {
        assert_eq!(id_for(ObjectKind::Blob, b"x"), id_for(ObjectKind::Blob, b"x"));
        assert_ne!(id_for(ObjectKind::Blob, b"x"), id_for(ObjectKind::Tree, b"x"));
    }
}
