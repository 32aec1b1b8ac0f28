//! High-level cache facade.

use std::path::{Path, PathBuf};

use strata_common::ContentHash;
use tracing::debug;

use crate::artifact::ArtifactStore;
use crate::blob::BlobStore;
use crate::error::CacheError;
use crate::key::CacheKey;

/// Facade over the blob and artifact stores under one cache directory.
///
/// All operations take `&self`; the underlying stores are plain filesystem
/// operations, so one `Cache` may be shared across concurrently running
/// transformation requests. Writes under the same address are idempotent
/// (the address encodes the value's full identity), so last-writer-wins is
/// safe.
pub struct Cache {
    /// Root directory under which both stores persist.
    cache_dir: PathBuf,

    /// Committed asset bytes, addressed by output hash.
    blobs: BlobStore,

    /// Memoized transformation results, addressed by cache key.
    artifacts: ArtifactStore,

    /// Engine version stamped into artifact headers.
    engine_version: String,
}

impl Cache {
    /// Opens the cache rooted at the given directory.
    ///
    /// No I/O happens here; subdirectories are created on first write.
    pub fn open(cache_dir: &Path, engine_version: &str) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            blobs: BlobStore::new(cache_dir),
            artifacts: ArtifactStore::new(cache_dir),
            engine_version: engine_version.to_string(),
        }
    }

    /// Returns the cache root directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Reads the memoized result under the given key. Fail-safe.
    pub fn get_artifact(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let result = self.artifacts.read(key, &self.engine_version);
        debug!(
            key = %key.to_hex(),
            hit = result.is_some(),
            "artifact cache lookup"
        );
        result
    }

    /// Writes a memoized result under the given key.
    pub fn put_artifact(&self, key: &CacheKey, payload: &[u8]) -> Result<(), CacheError> {
        debug!(key = %key.to_hex(), bytes = payload.len(), "artifact cache write");
        self.artifacts.write(key, payload, &self.engine_version)
    }

    /// Reads committed asset bytes by output hash. Fail-safe.
    pub fn read_blob(&self, hash: &ContentHash) -> Option<Vec<u8>> {
        self.blobs.read_blob(hash)
    }

    /// Writes committed asset bytes under their output hash.
    pub fn write_blob(&self, hash: &ContentHash, bytes: &[u8]) -> Result<(), CacheError> {
        self.blobs.write_blob(hash, bytes)
    }

    /// Returns `true` if committed bytes exist under the given output hash.
    pub fn has_blob(&self, hash: &ContentHash) -> bool {
        self.blobs.has_blob(hash)
    }

    /// Removes artifacts and blobs not referenced by the live sets.
    ///
    /// Returns the total number of files removed.
    pub fn gc(
        &self,
        live_keys: &[CacheKey],
        live_blobs: &[ContentHash],
    ) -> Result<usize, CacheError> {
        let removed = self.artifacts.gc(live_keys)? + self.blobs.gc(live_blobs)?;
        debug!(removed, "cache gc");
        Ok(removed)
    }
}
