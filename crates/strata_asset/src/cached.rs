//! Serializable asset records for the artifact cache.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_cache::Cache;
use strata_common::ContentHash;

use crate::asset::{Asset, AssetStats};
use crate::dependency::{ConnectedFile, Dependency};
use crate::env::Environment;
use crate::error::AssetError;
use crate::output::TransformOutput;

/// The serializable record of one committed asset.
///
/// Stored (as part of a list) in the artifact cache; the asset's bytes live
/// separately in the blob cache under `output_hash`. Records are encoded as
/// JSON because the metadata and symbol values are self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAsset {
    /// The asset's stable identifier.
    pub id: String,

    /// The file path the asset originated from.
    pub file_path: PathBuf,

    /// The asset's final type tag.
    pub asset_type: String,

    /// Hash of the asset's content bytes.
    pub content_hash: ContentHash,

    /// Content size in bytes.
    pub size: u64,

    /// Blob cache key holding the committed bytes.
    pub output_hash: ContentHash,

    /// The environment the asset was built for.
    pub env: Arc<Environment>,

    /// Dependencies in discovery order.
    pub dependencies: Vec<Dependency>,

    /// Connected files.
    pub connected_files: Vec<ConnectedFile>,

    /// Exported symbol → local name mappings.
    pub symbols: BTreeMap<String, String>,

    /// The side-effects flag.
    pub side_effects: bool,

    /// The isolation flag.
    pub is_isolated: bool,

    /// Metadata for downstream stages.
    pub meta: Value,

    /// Timing and size statistics.
    pub stats: AssetStats,
}

impl CachedAsset {
    /// Captures the record of a committed asset.
    ///
    /// Returns `None` if the asset has not been committed (and therefore has
    /// no output hash or blob entry to reference).
    pub fn capture(asset: &Asset) -> Option<Self> {
        let output_hash = asset.output_hash()?;
        Some(Self {
            id: asset.id().to_string(),
            file_path: asset.file_path().to_path_buf(),
            asset_type: asset.asset_type().to_string(),
            content_hash: asset.content_hash(),
            size: asset.size(),
            output_hash,
            env: Arc::clone(asset.env()),
            dependencies: asset.dependencies().to_vec(),
            connected_files: asset.connected_files().to_vec(),
            symbols: asset.symbols().clone(),
            side_effects: asset.side_effects(),
            is_isolated: asset.is_isolated(),
            meta: asset.meta().clone(),
            stats: asset.stats().clone(),
        })
    }

    /// Rebuilds a live asset from this record, materializing its content
    /// from the blob cache.
    ///
    /// The restored asset is mutable again (a later pipeline may transform
    /// it further); re-committing unchanged bytes rewrites the same blob
    /// key. Returns `None` if the blob is missing, which callers treat as a
    /// cache miss.
    pub fn restore(&self, cache: &Cache) -> Option<Asset> {
        let bytes = cache.read_blob(&self.output_hash)?;

        let mut output = TransformOutput::bytes(self.asset_type.clone(), bytes);
        output.dependencies = self.dependencies.clone();
        output.connected_files = self.connected_files.clone();
        output.symbols = self.symbols.clone();
        output.side_effects = Some(self.side_effects);
        output.is_isolated = self.is_isolated;
        output.meta = self.meta.clone();

        Some(Asset::restore_record(
            self.id.clone(),
            self.file_path.clone(),
            Arc::clone(&self.env),
            output,
            self.stats.clone(),
        ))
    }

    /// Encodes a list of records for storage as an artifact payload.
    pub fn encode_list(records: &[CachedAsset]) -> Result<Vec<u8>, AssetError> {
        serde_json::to_vec(records).map_err(|e| {
            AssetError::Cache(strata_cache::CacheError::Serialization {
                reason: e.to_string(),
            })
        })
    }

    /// Decodes a list of records from an artifact payload. Fail-safe.
    pub fn decode_list(payload: &[u8]) -> Option<Vec<CachedAsset>> {
        serde_json::from_slice(payload).ok()
    }
}
