//! Content hashing for cache keys and blob addressing.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit content hash computed using XXH3.
///
/// Two inputs with the same `ContentHash` are assumed to be identical. Used
/// throughout the engine to address committed asset bytes in the blob cache
/// and to fingerprint the full input set of a transformation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash over a byte slice.
    ///
    /// Equivalent to feeding the whole slice through a [`ContentHasher`].
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data).to_le_bytes())
    }

    /// Reconstructs a hash from its raw 16-byte representation.
    pub fn from_raw(raw: [u8; 16]) -> Self {
        Self(raw)
    }

    /// Returns the raw 16-byte representation.
    pub fn as_raw(&self) -> &[u8; 16] {
        &self.0
    }
}

/// Lowercase hex, 32 characters; this form names blob and artifact files.
impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

/// Abbreviated to the leading four bytes; full hashes drown log output.
impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, ..] = self.0;
        write!(f, "ContentHash({a:02x}{b:02x}{c:02x}{d:02x}..)")
    }
}

/// Incremental XXH3-128 hasher for content consumed in a single pass.
///
/// Wraps the streaming state so callers can interleave hashing with other
/// work on the same read (size counting, buffering). Finishing yields the
/// same hash as [`ContentHash::from_bytes`] over the concatenated input.
#[derive(Default)]
pub struct ContentHasher {
    state: Xxh3,
}

impl ContentHasher {
    /// Creates a fresh hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes into the hash state.
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Consumes the hasher and returns the final content hash.
    pub fn finish(self) -> ContentHash {
        ContentHash(self.state.digest128().to_le_bytes())
    }
}
