//! Error type for source content reads.

use std::path::PathBuf;

/// A source file could not be read.
///
/// Carries the path and the underlying I/O cause. This is the only failure
/// mode of content loading; hash mismatches across re-opens of a streamed
/// file are not detected here, the hash computed at load time is treated as
/// authoritative for the life of the request.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {path}: {source}")]
pub struct ContentReadError {
    /// The path that could not be read.
    pub path: PathBuf,

    /// The underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

impl ContentReadError {
    /// Creates a read error for the given path and cause.
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}
