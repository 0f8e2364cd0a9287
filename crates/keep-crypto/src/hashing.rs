//! # MD5 content digests
//!
//! Blocks are named by the MD5 digest of their bytes. MD5 is not used here
//! for any security property — it is the wire-compatible content identity
//! the locator format is built around.

use md5::{Digest, Md5};

/// Raw 128-bit MD5 digest.
pub type Digest16 = [u8; 16];

/// Stateful MD5 hasher for streaming input.
pub struct BlockHasher {
    inner: Md5,
}

impl BlockHasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self { inner: Md5::new() }
    }

    /// Feed more bytes in.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Consume the hasher and return the digest.
    pub fn finalize(self) -> Digest16 {
        self.inner.finalize().into()
    }
}

impl Default for BlockHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a complete buffer in one call.
pub fn digest(data: &[u8]) -> Digest16 {
    let mut hasher = BlockHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Render a digest as the 32-char lowercase hex string used in locators.
pub fn digest_to_hex(digest: &Digest16) -> String {
    hex::encode(digest)
}

/// Parse a 32-char lowercase hex string into a digest.
pub fn digest_from_hex(hex_str: &str) -> Result<Digest16, hex::FromHexError> {
    let bytes = hex::decode(hex_str)?;
    bytes
        .try_into()
        .map_err(|_| hex::FromHexError::InvalidStringLength)
}

/// Hash a buffer and return its locator-ready hex representation.
pub fn digest_hex(data: &[u8]) -> String {
    digest_to_hex(&digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // MD5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(digest_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        // MD5("foo") = acbd18db4cc2f85cedef654fccc4a4d8
        assert_eq!(digest_hex(b"foo"), "acbd18db4cc2f85cedef654fccc4a4d8");
    }

    #[test]
    fn streaming_matches_one_shot() {
        let oneshot = digest(b"hello world");
        let mut hasher = BlockHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(oneshot, hasher.finalize());
    }

    #[test]
    fn hex_round_trip() {
        let d = digest(b"round trip me");
        let hex_str = digest_to_hex(&d);
        assert_eq!(digest_from_hex(&hex_str).unwrap(), d);
    }
}
