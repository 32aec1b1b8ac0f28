//! The mutable per-asset record for the Strata asset engine.
//!
//! An [`Asset`] owns the state of one unit of content flowing through a
//! transformer pipeline: identity, type tag, content, optional AST,
//! environment, discovered dependencies, connected files, symbols, and
//! metadata. Transformers receive `&mut Asset` only inside their hook calls;
//! after [`Asset::commit`] the record is frozen and mutation fails.

#![warn(missing_docs)]

pub mod asset;
pub mod ast;
pub mod cached;
pub mod dependency;
pub mod env;
pub mod error;
pub mod output;

pub use asset::{Asset, AssetStats};
pub use ast::Ast;
pub use cached::CachedAsset;
pub use dependency::{ConnectedFile, Dependency, DependencyKind};
pub use env::{Environment, EnvironmentContext};
pub use error::AssetError;
pub use output::TransformOutput;
