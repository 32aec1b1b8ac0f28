//! Content-addressed storage of committed asset bytes.

use std::path::{Path, PathBuf};

use strata_common::ContentHash;

use crate::error::CacheError;

/// Subdirectory name for committed asset bytes.
const BLOB_SUBDIR: &str = "blobs";

/// Content-addressed store of committed asset bytes.
///
/// Each blob is stored at `<cache_dir>/blobs/<hex hash>` with no framing;
/// the filename is the address, so writes under the same hash are idempotent
/// and last-writer-wins is safe. Reads are fail-safe.
pub struct BlobStore {
    /// Root cache directory.
    cache_dir: PathBuf,
}

impl BlobStore {
    /// Creates a blob store rooted at the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Returns the file path for the blob with the given hash.
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.cache_dir.join(BLOB_SUBDIR).join(hash.to_string())
    }

    /// Writes a blob under the given hash.
    pub fn write_blob(&self, hash: &ContentHash, bytes: &[u8]) -> Result<(), CacheError> {
        let dir = self.cache_dir.join(BLOB_SUBDIR);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir,
            source: e,
        })?;

        let path = self.blob_path(hash);
        std::fs::write(&path, bytes).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Reads the blob with the given hash, or `None` if absent.
    pub fn read_blob(&self, hash: &ContentHash) -> Option<Vec<u8>> {
        std::fs::read(self.blob_path(hash)).ok()
    }

    /// Returns `true` if a blob exists under the given hash.
    pub fn has_blob(&self, hash: &ContentHash) -> bool {
        self.blob_path(hash).exists()
    }

    /// Removes blobs whose hash is not in the live set.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self, live: &[ContentHash]) -> Result<usize, CacheError> {
        let dir = self.cache_dir.join(BLOB_SUBDIR);
        if !dir.exists() {
            return Ok(0);
        }

        let live_names: Vec<String> = live.iter().map(|h| h.to_string()).collect();
        let mut removed = 0;
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if !live_names.iter().any(|l| l == name) {
                    std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                        path: path.clone(),
                        source: e,
                    })?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}
