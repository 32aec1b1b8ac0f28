//! Error types for the pipeline and driver.

use std::path::PathBuf;

use strata_asset::AssetError;
use strata_cache::CacheError;
use strata_config::ConfigLoadError;
use strata_source::ContentReadError;

use crate::transformer::HookError;

/// A transformer hook failed.
///
/// Decorated with the stage name and the asset it was processing; the
/// original cause is preserved as the error source.
#[derive(Debug, thiserror::Error)]
#[error("transformer {stage} failed on {file_path} ({asset_type})")]
pub struct TransformerError {
    /// The failing stage's name.
    pub stage: String,

    /// The asset's file path.
    pub file_path: PathBuf,

    /// The asset's type at the time of the failure.
    pub asset_type: String,

    /// The hook's own error.
    #[source]
    pub source: HookError,
}

/// A stage found an AST on the asset but no generator was available to
/// regenerate source.
///
/// The contract requires that any stage producing an AST also provides
/// `generate`; hitting this means a stage upstream broke it.
#[derive(Debug, thiserror::Error)]
#[error(
    "stage {stage} cannot reuse the held {dialect} AST on {file_path} and no generator is available"
)]
pub struct AstReuseError {
    /// The stage that needed source content.
    pub stage: String,

    /// The asset's file path.
    pub file_path: PathBuf,

    /// The dialect of the stranded AST.
    pub dialect: String,
}

/// Everything that can go wrong while transforming one request.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The source content could not be read.
    #[error(transparent)]
    Read(#[from] ContentReadError),

    /// A plugin config could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    /// A transformer hook failed.
    #[error(transparent)]
    Transformer(#[from] TransformerError),

    /// An AST was stranded without a generator.
    #[error(transparent)]
    AstReuse(#[from] AstReuseError),

    /// An asset operation failed (frozen mutation, invalid UTF-8, commit).
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// A cache write failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// No pipeline is registered for the asset's path.
    #[error("no pipeline registered for {path}")]
    NoPipeline {
        /// The path no rule matched.
        path: PathBuf,
    },
}

/// A transformation request failed as a whole.
///
/// The driver makes no attempt to continue a partially failed pipeline: the
/// request either yields a full asset set or this error.
#[derive(Debug, thiserror::Error)]
#[error("transformation of {file_path} failed: {source}")]
pub struct RequestError {
    /// The requested file path.
    pub file_path: PathBuf,

    /// What went wrong.
    #[source]
    pub source: EngineError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transformer_error_display() {
        let err = TransformerError {
            stage: "strata-transformer-js".to_string(),
            file_path: PathBuf::from("src/app.ts"),
            asset_type: "ts".to_string(),
            source: "unexpected token".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("strata-transformer-js"));
        assert!(msg.contains("src/app.ts"));
        assert!(msg.contains("(ts)"));
    }

    #[test]
    fn ast_reuse_error_display() {
        let err = AstReuseError {
            stage: "two".to_string(),
            file_path: PathBuf::from("a.js"),
            dialect: "swc".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("swc"));
        assert!(msg.contains("no generator"));
    }

    #[test]
    fn request_error_wraps_engine_error() {
        let err = RequestError {
            file_path: PathBuf::from("src/app.js"),
            source: EngineError::NoPipeline {
                path: PathBuf::from("src/app.mystery"),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("src/app.js"));
        assert!(msg.contains("no pipeline"));
    }
}
