//! Target environment description.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The kind of runtime an asset is being built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentContext {
    /// A browser target.
    Browser,

    /// A Node.js target.
    Node,

    /// A web worker target.
    WebWorker,
}

/// Description of the build target.
///
/// Opaque to the engine except that it participates in asset identity and
/// cache keys. Shared by reference (`Arc`) with child assets and dependency
/// records; never mutated after construction. Engine requirements live in an
/// ordered map so serialization is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// The runtime kind.
    pub context: EnvironmentContext,

    /// Engine version requirements, e.g. `"chrome" => ">=80"`.
    pub engines: BTreeMap<String, String>,

    /// Whether the build produces a library rather than an application.
    pub is_library: bool,
}

impl Environment {
    /// Creates an environment with no engine requirements.
    pub fn new(context: EnvironmentContext) -> Self {
        Self {
            context,
            engines: BTreeMap::new(),
            is_library: false,
        }
    }

    /// Adds an engine requirement.
    pub fn with_engine(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.engines.insert(name.into(), range.into());
        self
    }

    /// Serializes the environment to canonical bytes for hashing.
    ///
    /// Field order is fixed by the struct definition and the engines map is
    /// ordered, so equal environments always produce equal bytes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .unwrap_or_default()
    }
}
