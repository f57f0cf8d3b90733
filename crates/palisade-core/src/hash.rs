//! Deterministic hashing helpers.
//!
//! All state commitments in this crate are SHA-256 over a canonical
//! little-endian byte encoding. The encoding is length-prefixed where the
//! field is variable-size, so concatenations cannot collide.

use sha2::{Digest, Sha256};

use crate::Hash32;

/// Compute a SHA-256 hash of a byte slice.
pub fn sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash32(bytes)
}

/// Incremental canonical encoder feeding a SHA-256 state.
pub struct CanonicalHasher {
    inner: Sha256,
}

impl CanonicalHasher {
    pub fn new(domain: &[u8]) -> Self {
        let mut inner = Sha256::new();
        inner.update((domain.len() as u32).to_le_bytes());
        inner.update(domain);
        CanonicalHasher { inner }
    }

    pub fn u64(&mut self, v: u64) {
        self.inner.update(v.to_le_bytes());
    }

    pub fn u128(&mut self, v: u128) {
        self.inner.update(v.to_le_bytes());
    }

    pub fn bool(&mut self, v: bool) {
        self.inner.update([v as u8]);
    }

    pub fn bytes32(&mut self, v: &Hash32) {
        self.inner.update(v.0);
    }

    /// Length prefix for a variable-size sequence about to be encoded.
    pub fn len(&mut self, n: usize) {
        self.inner.update((n as u64).to_le_bytes());
    }

    pub fn finish(self) -> Hash32 {
        let result = self.inner.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        Hash32(bytes)
    }
}
