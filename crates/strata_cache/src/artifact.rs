//! Storage of memoized transformation results with validated headers.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::ContentHash;

use crate::error::CacheError;
use crate::key::CacheKey;

/// Magic bytes identifying a Strata cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"STRA";

/// Current artifact format version. Increment on breaking changes to the
/// header or payload framing.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Subdirectory name for memoized transformation results.
const ARTIFACT_SUBDIR: &str = "artifacts";

/// File extension for artifact entries.
const ARTIFACT_EXT: &str = "art";

/// Header prepended to every artifact entry for validation.
///
/// The engine version participates so that entries written by another engine
/// release read as misses rather than being deserialized into mismatched
/// types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"STRA"`.
    pub magic: [u8; 4],

    /// Artifact format version.
    pub format_version: u32,

    /// Engine version that produced this artifact.
    pub engine_version: String,

    /// Content hash of the payload data.
    pub checksum: ContentHash,
}

/// Store for memoized transformation results, keyed by [`CacheKey`].
///
/// Each entry is stored at `<cache_dir>/artifacts/<hex key>.art` as a
/// 4-byte little-endian header length, the bincode-encoded header, and the
/// raw payload. Reads validate magic bytes, format version, engine version,
/// and payload checksum; any failure is a cache miss.
pub struct ArtifactStore {
    /// Root cache directory.
    cache_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates an artifact store rooted at the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Returns the file path for the entry under the given key.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(ARTIFACT_SUBDIR)
            .join(format!("{}.{ARTIFACT_EXT}", key.to_hex()))
    }

    /// Writes a payload under the given key.
    pub fn write(
        &self,
        key: &CacheKey,
        payload: &[u8],
        engine_version: &str,
    ) -> Result<(), CacheError> {
        let dir = self.cache_dir.join(ARTIFACT_SUBDIR);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir,
            source: e,
        })?;

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            engine_version: engine_version.to_string(),
            checksum: ContentHash::from_bytes(payload),
        };

        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // Framing: 4-byte header length (little-endian) + header + payload.
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(payload);

        let path = self.entry_path(key);
        std::fs::write(&path, &output).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Reads the payload under the given key, validating the header.
    ///
    /// Returns `None` if the entry is missing, malformed, produced by a
    /// different engine or format version, or fails its checksum.
    pub fn read(&self, key: &CacheKey, engine_version: &str) -> Option<Vec<u8>> {
        let raw = std::fs::read(self.entry_path(key)).ok()?;

        if raw.len() < 4 {
            return None;
        }
        let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
        if raw.len() < 4 + header_len {
            return None;
        }

        let header: ArtifactHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .ok()?
                .0;

        if header.magic != ARTIFACT_MAGIC
            || header.format_version != ARTIFACT_FORMAT_VERSION
            || header.engine_version != engine_version
        {
            return None;
        }

        let payload = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload) != header.checksum {
            return None;
        }

        Some(payload.to_vec())
    }

    /// Removes entries whose key is not in the live set.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self, live_keys: &[CacheKey]) -> Result<usize, CacheError> {
        let dir = self.cache_dir.join(ARTIFACT_SUBDIR);
        if !dir.exists() {
            return Ok(0);
        }

        let live_names: Vec<String> = live_keys.iter().map(|k| k.to_hex()).collect();
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
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !live_names.iter().any(|l| l == stem) {
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
