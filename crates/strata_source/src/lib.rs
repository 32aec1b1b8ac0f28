//! Source content loading for the Strata asset engine.
//!
//! Resolves a transformation request to `(content, size, content_hash)` in a
//! single read pass. Small files are materialized into memory; files over the
//! streaming threshold are represented by a re-openable handle so that large
//! assets never have to be held in memory whole.

#![warn(missing_docs)]

pub mod content;
pub mod error;

pub use content::{FileContent, SourceContent, STREAM_THRESHOLD};
pub use error::ContentReadError;
