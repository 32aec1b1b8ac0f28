//! Shared foundational types used across the Strata asset engine.
//!
//! This crate provides content hashing: the fixed-width [`ContentHash`] used
//! to key the blob and artifact caches, and the streaming [`ContentHasher`]
//! used when content is consumed in a single pass.

#![warn(missing_docs)]

pub mod hash;

pub use hash::{ContentHash, ContentHasher};
