//! Result descriptors returned by transformer hooks.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use strata_common::ContentHash;
use strata_source::FileContent;

use crate::ast::Ast;
use crate::dependency::{ConnectedFile, Dependency};
use crate::env::Environment;

/// A descriptor for one asset produced by a `transform` or `post_process`
/// hook.
///
/// Descriptors become child assets via [`Asset::create_child`]
/// (crate::Asset::create_child): the child inherits the parent's
/// dependencies, connected files, and environment, then takes content, AST,
/// type, and the remaining fields from the descriptor.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// The child's type tag.
    pub asset_type: String,

    /// The child's content.
    pub content: FileContent,

    /// Hash of the child's content bytes.
    pub content_hash: ContentHash,

    /// The child's content size in bytes.
    pub size: u64,

    /// An AST for the child, if the producing stage parsed one.
    pub ast: Option<Ast>,

    /// Dependencies discovered for the child, beyond those inherited.
    pub dependencies: Vec<Dependency>,

    /// Connected files for the child, beyond those inherited.
    pub connected_files: Vec<ConnectedFile>,

    /// Exported symbol → local name mappings for the child.
    pub symbols: BTreeMap<String, String>,

    /// Overrides the inherited side-effects flag when set.
    pub side_effects: Option<bool>,

    /// Whether the child must be kept isolated from sibling assets.
    pub is_isolated: bool,

    /// Metadata for downstream stages; `Null` inherits the parent's.
    pub meta: Value,

    /// Overrides the inherited environment when set.
    pub env: Option<Arc<Environment>>,
}

impl TransformOutput {
    /// Builds a descriptor for a UTF-8 code child of the given type.
    pub fn code(asset_type: impl Into<String>, code: impl Into<String>) -> Self {
        let bytes = code.into().into_bytes();
        Self::bytes(asset_type, bytes)
    }

    /// Builds a descriptor for a binary child of the given type.
    pub fn bytes(asset_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            asset_type: asset_type.into(),
            content_hash: ContentHash::from_bytes(&bytes),
            size: bytes.len() as u64,
            content: FileContent::Buffer(bytes),
            ast: None,
            dependencies: Vec::new(),
            connected_files: Vec::new(),
            symbols: BTreeMap::new(),
            side_effects: None,
            is_isolated: false,
            meta: Value::Null,
            env: None,
        }
    }

    /// Attaches an AST to the descriptor.
    pub fn with_ast(mut self, ast: Ast) -> Self {
        self.ast = Some(ast);
        self
    }
}
