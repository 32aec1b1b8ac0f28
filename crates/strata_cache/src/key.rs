//! Cache key fingerprints over the full input set of a transformation.

use std::path::PathBuf;

use strata_common::{ContentHash, ContentHasher};

/// The per-asset slice of a cache key: path, current type, content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFingerprint {
    /// The asset's file path (or synthetic path for inline code).
    pub file_path: PathBuf,

    /// The asset's current type tag.
    pub asset_type: String,

    /// Hash of the asset's content bytes.
    pub hash: ContentHash,
}

/// The per-config slice of a cache key: identity plus everything the config
/// load depended on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFingerprint {
    /// The plugin package the config belongs to.
    pub package_name: String,

    /// Stable bytes identifying the loaded config value.
    pub result_hash: String,

    /// `(package, version)` pairs the config load depended on.
    pub dev_deps: Vec<(String, String)>,
}

/// A stable fingerprint over every input that could change a transformation's
/// output: asset identities, plugin configs, the environment, and the
/// impactful option subset.
///
/// Canonicalization happens here so the key is identical across restarts and
/// insertion orders: configs are sorted by package name, dev-dep sets are
/// sorted, and every field is fed to the hasher behind a length prefix so
/// adjacent fields cannot alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(ContentHash);

impl CacheKey {
    /// Computes the key over the given inputs.
    ///
    /// `environment` and `options` arrive as canonical bytes produced by the
    /// caller (serialized with a fixed field order).
    pub fn compute(
        assets: &[AssetFingerprint],
        configs: &[ConfigFingerprint],
        environment: &[u8],
        options: &[u8],
    ) -> Self {
        let mut hasher = ContentHasher::new();

        feed(&mut hasher, b"assets");
        for asset in assets {
            feed(&mut hasher, asset.file_path.to_string_lossy().as_bytes());
            feed(&mut hasher, asset.asset_type.as_bytes());
            feed(&mut hasher, asset.hash.as_raw());
        }

        feed(&mut hasher, b"configs");
        let mut ordered: Vec<&ConfigFingerprint> = configs.iter().collect();
        ordered.sort_by(|a, b| a.package_name.cmp(&b.package_name));
        for config in ordered {
            feed(&mut hasher, config.package_name.as_bytes());
            feed(&mut hasher, config.result_hash.as_bytes());
            let mut deps = config.dev_deps.clone();
            deps.sort();
            for (package, version) in &deps {
                feed(&mut hasher, package.as_bytes());
                feed(&mut hasher, version.as_bytes());
            }
        }

        feed(&mut hasher, b"environment");
        feed(&mut hasher, environment);
        feed(&mut hasher, b"options");
        feed(&mut hasher, options);

        Self(hasher.finish())
    }

    /// Returns the hex form used as the artifact filename.
    pub fn to_hex(&self) -> String {
        self.0.to_string()
    }
}

/// Feeds one field with a length prefix so field boundaries are unambiguous.
fn feed(hasher: &mut ContentHasher, field: &[u8]) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field);
}
