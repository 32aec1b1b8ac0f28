//! Error types for asset operations.

use strata_cache::CacheError;
use strata_source::ContentReadError;

/// Errors that can occur while operating on an asset record.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Mutation was attempted after the asset was committed.
    ///
    /// This is a programmer error in a transformer: asset views handed to
    /// hooks are mutable only until commit.
    #[error("asset {id} is frozen; mutation after commit is not allowed")]
    Frozen {
        /// The committed asset's id.
        id: String,
    },

    /// The asset's content could not be read.
    #[error(transparent)]
    Read(#[from] ContentReadError),

    /// The asset's content is not valid UTF-8.
    #[error("asset {id} content is not valid UTF-8")]
    InvalidUtf8 {
        /// The asset's id.
        id: String,
    },

    /// Writing the committed bytes to the blob cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An ancillary config file was found but could not be parsed.
    #[error("failed to parse config file {path}: {reason}")]
    ConfigParse {
        /// The config file path.
        path: std::path::PathBuf,
        /// Description of the parse failure.
        reason: String,
    },
}
