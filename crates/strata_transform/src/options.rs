//! Global build options consumed by the engine.

use std::path::PathBuf;

use strata_common::ContentHash;

/// Options shared by every pipeline an engine instance runs.
///
/// Only the impactful subset (`minify`, `hot`, `scope_hoist`) participates
/// in cache keys and per-asset commit hashes. The subset is captured once
/// per driver: every pipeline run by one engine instance shares one option
/// set, so per-pipeline option sensitivity does not arise.
#[derive(Debug, Clone)]
pub struct Options {
    /// Project root; generators use it to compute relative source-map paths.
    pub project_root: PathBuf,

    /// Directory under which the artifact and blob caches persist.
    pub cache_dir: PathBuf,

    /// When `false`, all cache reads are skipped. Writes still occur so
    /// downstream consumers reading by key stay consistent.
    pub cache: bool,

    /// Whether output should be minified.
    pub minify: bool,

    /// Whether hot-reload wiring is injected.
    pub hot: bool,

    /// Whether scope hoisting is enabled.
    pub scope_hoist: bool,

    /// Whether generators emit source maps.
    pub source_maps: bool,
}

impl Options {
    /// Creates options rooted at the given project directory, with the
    /// cache under `<project_root>/.strata-cache` and caching enabled.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let cache_dir = project_root.join(".strata-cache");
        Self {
            project_root,
            cache_dir,
            cache: true,
            minify: false,
            hot: false,
            scope_hoist: false,
            source_maps: true,
        }
    }

    /// Canonical bytes of the impactful option subset.
    pub fn impactful_bytes(&self) -> Vec<u8> {
        vec![
            self.minify as u8,
            self.hot as u8,
            self.scope_hoist as u8,
        ]
    }

    /// Hash of the impactful option subset, mixed into every commit hash
    /// and cache key.
    pub fn impactful_hash(&self) -> ContentHash {
        ContentHash::from_bytes(&self.impactful_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::new("/proj");
        assert!(opts.cache);
        assert!(!opts.minify);
        assert!(opts.source_maps);
        assert_eq!(opts.cache_dir, PathBuf::from("/proj/.strata-cache"));
    }

    #[test]
    fn impactful_hash_tracks_impactful_options_only() {
        let base = Options::new("/proj");

        let mut minified = Options::new("/proj");
        minified.minify = true;
        assert_ne!(base.impactful_hash(), minified.impactful_hash());

        let mut no_maps = Options::new("/proj");
        no_maps.source_maps = false;
        assert_eq!(base.impactful_hash(), no_maps.impactful_hash());
    }
}
