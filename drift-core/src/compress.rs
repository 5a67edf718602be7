//! Deflate compression for stored objects.
//!
//! Objects are zlib-framed on disk, compressed with the fast preset. Inflate
//! grows its output buffer as needed up to a hard ceiling; anything larger is
//! declared corrupt rather than exhausting memory.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Inflated objects above this size are rejected as corrupt.
pub const MAX_OBJECT_SIZE: usize = 1 << 30;

/// Compress a byte buffer with the low-latency preset.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a byte buffer, growing the output as needed.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len().saturating_mul(3).max(64));
    let mut chunk = [0u8; 64 * 1024];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if out.len() + n > MAX_OBJECT_SIZE {
                    return Err(Error::Corrupt("inflated object exceeds size ceiling".into()));
                }
                out.extend_from_slice(&chunk[..n]);
            }
            Err(e) => return Err(Error::Corrupt(format!("inflate failed: {e}"))),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let packed = deflate(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(inflate(&packed).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_empty() {
        let packed = deflate(b"").unwrap();
        assert_eq!(inflate(&packed).unwrap(), b"");
    }

    #[test]
    fn test_inflate_rejects_garbage() {
        assert!(inflate(b"definitely not a zlib stream").is_err());
    }
}
