//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur while writing to the cache.
///
/// Reads are fail-safe and never surface errors; this enum covers the write
/// path, which is fatal only when it prevents an asset commit from
/// completing.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An artifact payload or header could not be encoded.
    #[error("cache serialization error: {reason}")]
    Serialization {
        /// Description of the encoding failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = CacheError::Io {
            path: PathBuf::from("/cache/blobs/abc"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cache I/O error"));
        assert!(msg.contains("blobs/abc"));
    }

    #[test]
    fn serialization_error_display() {
        let err = CacheError::Serialization {
            reason: "header too large".to_string(),
        };
        assert!(err.to_string().contains("header too large"));
    }
}
