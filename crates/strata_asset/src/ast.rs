//! Parsed asset representation.

use serde::{Deserialize, Serialize};

/// A parsed representation of an asset's content.
///
/// Tagged with the dialect that produced it and the dialect's version so a
/// later stage can decide whether it can consume the tree directly or needs
/// the content regenerated to source first. The tree itself is an opaque
/// value the engine never interprets; the owning asset holds it exclusively
/// and transformers mutate it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    /// The dialect tag, e.g. `"swc"` or `"postcss"`.
    pub dialect: String,

    /// The dialect version the tree was produced with.
    pub dialect_version: String,

    /// The tree itself; opaque to the engine.
    pub program: serde_json::Value,
}

impl Ast {
    /// Creates an AST with the given dialect tag and version.
    pub fn new(
        dialect: impl Into<String>,
        dialect_version: impl Into<String>,
        program: serde_json::Value,
    ) -> Self {
        Self {
            dialect: dialect.into(),
            dialect_version: dialect_version.into(),
            program,
        }
    }

    /// Returns `true` if this tree matches the given dialect and version.
    pub fn matches(&self, dialect: &str, dialect_version: &str) -> bool {
        self.dialect == dialect && self.dialect_version == dialect_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_same_dialect_and_version() {
        let ast = Ast::new("swc", "1.3", serde_json::json!({"body": []}));
        assert!(ast.matches("swc", "1.3"));
        assert!(!ast.matches("swc", "1.4"));
        assert!(!ast.matches("babel", "1.3"));
    }

    #[test]
    fn program_is_mutable_in_place() {
        let mut ast = Ast::new("swc", "1.3", serde_json::json!({"body": []}));
        ast.program["annotated"] = serde_json::json!(true);
        assert_eq!(ast.program["annotated"], true);
    }
}
