//! Content-addressed caching for the Strata asset engine.
//!
//! Two stores live under the cache directory: the blob store holds committed
//! asset bytes addressed by output hash, and the artifact store memoizes
//! whole transformation results under a [`CacheKey`] fingerprint of every
//! input that could change the output. All reads are fail-safe: corruption,
//! version mismatches, and missing entries read as cache misses.

#![warn(missing_docs)]

pub mod artifact;
pub mod blob;
pub mod cache;
pub mod error;
pub mod key;

pub use artifact::ArtifactStore;
pub use blob::BlobStore;
pub use cache::Cache;
pub use error::CacheError;
pub use key::{AssetFingerprint, CacheKey, ConfigFingerprint};
