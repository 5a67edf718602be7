//! Object identity: the 20-byte content digest.
//!
//! Every stored object is addressed by the digest of its framed
//! serialization (`"<kind> <len>\0<payload>"`, see [`crate::object`]). The
//! digest is an addressing key, not a security boundary.

use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Raw digest width in bytes
pub const RAW_LEN: usize = 20;

/// Canonical hex form width in characters
pub const HEX_LEN: usize = 40;

/// Unique identifier for any stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; RAW_LEN]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; RAW_LEN]) -> Self {
        Self(bytes)
    }

    /// Compute the ObjectId of a byte sequence
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha1::digest(data);
        Self(hash.into())
    }

    /// Convert to 40-char lowercase hexadecimal
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from 40-char hexadecimal
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|_| Error::Corrupt(format!("bad object id hex: {hex_str:?}")))?;
        if bytes.len() != RAW_LEN {
            return Err(Error::Corrupt(format!("bad object id length: {hex_str:?}")));
        }
        let mut arr = [0u8; RAW_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; RAW_LEN] {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Check whether a string is a plausible 40-char hex digest.
pub fn looks_hex40(s: &str) -> bool {
    s.len() == HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
