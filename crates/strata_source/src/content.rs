//! Buffer-or-stream content representation and one-pass loading.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_common::{ContentHash, ContentHasher};

use crate::error::ContentReadError;

/// Files larger than this are represented as re-openable streams rather than
/// in-memory buffers (5 MiB).
pub const STREAM_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Read chunk size for the one-pass hashing read.
const CHUNK_SIZE: usize = 64 * 1024;

/// The content of an asset: a materialized buffer or a re-openable stream.
///
/// Exactly one representation is held at a time. A `Stream` records the path
/// it was loaded from; consumers that need the bytes re-open the file. The
/// content hash computed at load time remains authoritative even if the file
/// changes underneath a later re-open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileContent {
    /// Fully materialized content.
    Buffer(Vec<u8>),

    /// A handle to content left on disk; reads re-open the file.
    Stream(PathBuf),
}

impl FileContent {
    /// Materializes the content as bytes, re-opening a streamed file.
    pub fn read_bytes(&self) -> Result<Vec<u8>, ContentReadError> {
        match self {
            FileContent::Buffer(bytes) => Ok(bytes.clone()),
            FileContent::Stream(path) => {
                std::fs::read(path).map_err(|e| ContentReadError::new(path.clone(), e))
            }
        }
    }

    /// Returns `true` if the content is held as an in-memory buffer.
    pub fn is_buffer(&self) -> bool {
        matches!(self, FileContent::Buffer(_))
    }
}

/// The result of loading a request's content: bytes (or a stream handle),
/// the total size, and the content hash over the full bytes.
#[derive(Debug, Clone)]
pub struct SourceContent {
    /// The loaded content.
    pub content: FileContent,

    /// Total content size in bytes.
    pub size: u64,

    /// XXH3-128 hash over the full content bytes.
    pub hash: ContentHash,
}

impl SourceContent {
    /// Builds content for an inline code blob.
    ///
    /// The hash is computed over the exact bytes; the content is always a
    /// buffer regardless of size.
    pub fn from_inline(code: &str) -> Self {
        let bytes = code.as_bytes().to_vec();
        Self {
            size: bytes.len() as u64,
            hash: ContentHash::from_bytes(&bytes),
            content: FileContent::Buffer(bytes),
        }
    }

    /// Loads a file with a single read pass.
    ///
    /// Every chunk feeds the hasher and the size counter. Chunks also append
    /// to an in-memory buffer until the cumulative size exceeds
    /// [`STREAM_THRESHOLD`]; once crossed, the buffer is discarded and the
    /// result is a [`FileContent::Stream`] over the original path. The hash
    /// always covers the full file either way.
    pub fn read_path(path: &Path) -> Result<Self, ContentReadError> {
        Self::read_path_with_threshold(path, STREAM_THRESHOLD)
    }

    /// As [`read_path`](Self::read_path) with an explicit threshold.
    pub fn read_path_with_threshold(
        path: &Path,
        threshold: u64,
    ) -> Result<Self, ContentReadError> {
        let mut file =
            std::fs::File::open(path).map_err(|e| ContentReadError::new(path, e))?;

        let mut hasher = ContentHasher::new();
        let mut size: u64 = 0;
        let mut buffer: Option<Vec<u8>> = Some(Vec::new());
        let mut chunk = vec![0u8; CHUNK_SIZE];

        loop {
            let n = file
                .read(&mut chunk)
                .map_err(|e| ContentReadError::new(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
            size += n as u64;

            if let Some(buf) = &mut buffer {
                if size > threshold {
                    buffer = None;
                } else {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
        }

        let content = match buffer {
            Some(buf) => FileContent::Buffer(buf),
            None => FileContent::Stream(path.to_path_buf()),
        };

        Ok(Self {
            content,
            size,
            hash: hasher.finish(),
        })
    }
}
