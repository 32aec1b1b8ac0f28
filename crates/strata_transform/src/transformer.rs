//! The transformer contract: the capability set every pipeline stage
//! implements.

use std::path::{Path, PathBuf};

use serde_json::Value;
use strata_asset::{Asset, Ast, TransformOutput};
use strata_config::PluginConfig;

use crate::options::Options;

/// Error type for transformer hooks and the resolver callback.
///
/// Hooks fail for plugin-specific reasons the engine cannot enumerate; the
/// pipeline wraps whatever they return with stage and asset context.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Code and optional source map emitted by a stage's generator.
#[derive(Debug, Clone)]
pub struct Generated {
    /// The regenerated source code.
    pub code: String,

    /// The source map, when the stage produces one and source maps are
    /// enabled.
    pub map: Option<Value>,
}

/// The optional capabilities a stage declares.
///
/// The pipeline consults this report instead of probing for methods: a stage
/// that overrides [`Transformer::parse`] must also report `parse: true`, and
/// likewise for the other optional hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The stage implements `parse`.
    pub parse: bool,

    /// The stage implements `generate`.
    pub generate: bool,

    /// The stage implements `post_process`.
    pub post_process: bool,

    /// The stage requires a config loaded through the host callback.
    pub load_config: bool,
}

/// One item returned by a `transform` hook.
#[derive(Debug)]
pub enum TransformResult {
    /// Carry the (possibly mutated) input asset forward. The pipeline reads
    /// the asset's current state back into a result descriptor.
    Forward,

    /// A new asset described by the descriptor.
    Output(TransformOutput),
}

/// Resolver callback injected by the engine.
///
/// Defers to the external resolver collaborator; transformers must route all
/// specifier resolution through it. Shared across concurrent requests, so
/// implementations must be internally thread-safe.
pub trait Resolver: Send + Sync {
    /// Resolves `specifier` as referenced from `from` to a file path.
    fn resolve(&self, from: &Path, specifier: &str) -> Result<PathBuf, HookError>;
}

/// Per-hook context handed to every transformer invocation.
pub struct StageContext<'a> {
    /// The stage's preloaded config, when it declared `load_config`.
    pub config: Option<&'a PluginConfig>,

    /// Global build options.
    pub options: &'a Options,

    /// The injected resolver callback.
    pub resolver: &'a dyn Resolver,
}

/// A pluggable pipeline stage.
///
/// Only `transform` is required; the other hooks are optional capabilities
/// declared through [`Capabilities`]. Transformers must be pure with respect
/// to global state: all I/O goes through the asset views, `read_config`, and
/// the injected resolver.
pub trait Transformer: Send + Sync {
    /// The stage's package name; also its config key and its segment in the
    /// pipeline id.
    fn name(&self) -> &str;

    /// The optional capabilities this stage provides.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Whether this stage can consume the given AST directly.
    ///
    /// When this returns `false` (the default) and the asset holds an AST,
    /// the pipeline regenerates source through the previous stage's
    /// generator before calling [`transform`](Self::transform).
    fn can_reuse_ast(&self, _ast: &Ast, _cx: &StageContext<'_>) -> bool {
        false
    }

    /// Produces an AST from the asset's current content.
    fn parse(
        &self,
        _asset: &mut Asset,
        _cx: &StageContext<'_>,
    ) -> Result<Option<Ast>, HookError> {
        Ok(None)
    }

    /// The core operation: rewrite the asset in place and return
    /// [`TransformResult::Forward`], or return descriptors for one or more
    /// child assets.
    fn transform(
        &self,
        asset: &mut Asset,
        cx: &StageContext<'_>,
    ) -> Result<Vec<TransformResult>, HookError>;

    /// Converts an AST back to source code.
    fn generate(
        &self,
        _asset: &Asset,
        _ast: &Ast,
        _cx: &StageContext<'_>,
    ) -> Result<Generated, HookError> {
        Err("stage declares no generator".into())
    }

    /// Whole-pipeline finalization pass over the finished asset set.
    fn post_process(
        &self,
        _assets: &[Asset],
        _cx: &StageContext<'_>,
    ) -> Result<Vec<TransformOutput>, HookError> {
        Ok(Vec::new())
    }
}
