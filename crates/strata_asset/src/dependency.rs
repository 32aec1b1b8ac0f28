//! Dependency and connected-file records accumulated during transformation.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_common::ContentHash;

use crate::env::Environment;

/// How a dependency specifier should be resolved by the outer graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    /// An ES module import.
    Import,

    /// A CommonJS require.
    Require,

    /// A URL reference (e.g. from CSS or HTML).
    Url,
}

/// One dependency discovered by a transformer.
///
/// The engine only accumulates these in order; resolution and scheduling
/// belong to the outer dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// The raw specifier as written in the source.
    pub specifier: String,

    /// How the specifier should be resolved.
    pub kind: DependencyKind,

    /// The file the specifier appeared in.
    pub source_path: Option<PathBuf>,

    /// The environment the dependency should be built for; propagated
    /// unchanged from the depending asset.
    pub env: Arc<Environment>,
}

/// An ancillary file whose contents influence an asset.
///
/// Typically a config file a transformer read while processing the asset
/// (e.g. a `.babelrc`). The hash lets the outer graph invalidate the asset
/// when the connected file changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedFile {
    /// The connected file's path.
    pub path: PathBuf,

    /// Hash of the connected file's contents at read time.
    pub hash: ContentHash,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvironmentContext;

    #[test]
    fn dependency_serde_roundtrip() {
        let dep = Dependency {
            specifier: "./util".to_string(),
            kind: DependencyKind::Import,
            source_path: Some(PathBuf::from("src/app.js")),
            env: Arc::new(Environment::new(EnvironmentContext::Browser)),
        };
        let json = serde_json::to_string(&dep).unwrap();
        let back: Dependency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dep);
    }

    #[test]
    fn connected_file_serde_roundtrip() {
        let cf = ConnectedFile {
            path: PathBuf::from(".babelrc"),
            hash: ContentHash::from_bytes(b"{}"),
        };
        let json = serde_json::to_string(&cf).unwrap();
        let back: ConnectedFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cf);
    }
}
