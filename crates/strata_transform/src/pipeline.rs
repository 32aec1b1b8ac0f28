//! The ordered transformer chain and its run loop.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use strata_asset::{Asset, TransformOutput};
use strata_cache::ConfigFingerprint;
use strata_config::PluginConfig;
use tracing::trace;

use crate::error::{AstReuseError, EngineError, TransformerError};
use crate::options::Options;
use crate::transformer::{HookError, Resolver, StageContext, TransformResult, Transformer};

/// One stage of a pipeline: a transformer plus its preloaded config.
pub struct PipelineStage {
    /// The transformer implementation.
    pub transformer: Arc<dyn Transformer>,

    /// The stage's config, when it declared `load_config`.
    pub config: Option<PluginConfig>,
}

impl PipelineStage {
    fn context<'a>(&'a self, options: &'a Options, resolver: &'a dyn Resolver) -> StageContext<'a> {
        StageContext {
            config: self.config.as_ref(),
            options,
            resolver,
        }
    }
}

/// An ordered chain of transformer stages selected for one file path.
///
/// The pipeline id is the joined list of stage names; two paths whose rules
/// produce the same chain share an id, which is what stops type-change
/// re-dispatch from looping.
pub struct Pipeline {
    id: String,
    initial_type: String,
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    /// Builds a pipeline over the given stages for assets of `initial_type`.
    pub fn new(initial_type: impl Into<String>, stages: Vec<PipelineStage>) -> Self {
        let id = stages
            .iter()
            .map(|s| s.transformer.name())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            id,
            initial_type: initial_type.into(),
            stages,
        }
    }

    /// The pipeline id: the joined stage names.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The asset type this pipeline was selected for.
    pub fn initial_type(&self) -> &str {
        &self.initial_type
    }

    /// The config slices of this pipeline for cache-key computation.
    pub fn config_fingerprints(&self) -> Vec<ConfigFingerprint> {
        self.stages
            .iter()
            .filter_map(|s| s.config.as_ref())
            .map(|c| ConfigFingerprint {
                package_name: c.package_name.clone(),
                result_hash: c.result_hash.clone(),
                dev_deps: c.dev_deps.iter().cloned().collect(),
            })
            .collect()
    }

    /// The stage whose `post_process` finalizes this pipeline's asset set,
    /// if any.
    ///
    /// Determined statically from the capability reports (the last declaring
    /// stage wins), so it is known even on runs served entirely from cache.
    pub fn post_process_stage(&self) -> Option<&PipelineStage> {
        self.stages
            .iter()
            .rev()
            .find(|s| s.transformer.capabilities().post_process)
    }

    /// Whether any stage declares a postprocessor.
    pub fn has_post_process(&self) -> bool {
        self.post_process_stage().is_some()
    }

    /// Drives one asset through every stage.
    ///
    /// The working set starts as `[initial]` and grows through child
    /// emission. An asset whose type diverges from the pipeline's initial
    /// type is moved to the final list exactly once and exits the pipeline
    /// unchanged from that point. After the last stage, any asset still
    /// holding an AST has its source regenerated through the remembered
    /// generator.
    pub fn transform(
        &self,
        initial: Asset,
        options: &Options,
        resolver: &dyn Resolver,
    ) -> Result<Vec<Asset>, EngineError> {
        let mut working = vec![initial];
        let mut finals: Vec<Asset> = Vec::new();
        // The most recent stage declaring `generate`, carried across stages
        // so a later stage that rejects an AST can fall back to source.
        let mut generator: Option<&PipelineStage> = None;

        for stage in &self.stages {
            let cx = stage.context(options, resolver);
            let mut produced = Vec::new();

            for mut asset in std::mem::take(&mut working) {
                if asset.asset_type() != self.initial_type {
                    finals.push(asset);
                    continue;
                }

                reconcile_ast(stage, generator, &mut asset, options, resolver)?;

                let started = Instant::now();
                let results = stage
                    .transformer
                    .transform(&mut asset, &cx)
                    .map_err(|e| hook_error(stage, &asset, e))?;
                asset.add_transform_time(started.elapsed())?;
                trace!(
                    stage = stage.transformer.name(),
                    asset = %asset.file_path().display(),
                    results = results.len(),
                    "stage applied"
                );

                for result in results {
                    let output = match result {
                        TransformResult::Forward => forward_output(&mut asset)?,
                        TransformResult::Output(output) => output,
                    };
                    produced.push(asset.create_child(output));
                }
            }

            working = produced;
            if stage.transformer.capabilities().generate {
                generator = Some(stage);
            }
        }

        finals.extend(working);

        for asset in &mut finals {
            if asset.ast().is_some() {
                generate_code(generator, asset, "commit", options, resolver)?;
            }
        }

        Ok(finals)
    }

    /// Runs the pipeline's postprocessor over the finished asset set.
    ///
    /// Returns `None` when no stage declares one. The returned descriptors
    /// replace the asset set.
    pub fn post_process(
        &self,
        assets: &[Asset],
        options: &Options,
        resolver: &dyn Resolver,
    ) -> Result<Option<Vec<TransformOutput>>, EngineError> {
        let Some(stage) = self.post_process_stage() else {
            return Ok(None);
        };
        let cx = stage.context(options, resolver);
        let outputs = stage
            .transformer
            .post_process(assets, &cx)
            .map_err(|e| TransformerError {
                stage: stage.transformer.name().to_string(),
                file_path: assets
                    .first()
                    .map(|a| a.file_path().to_path_buf())
                    .unwrap_or_default(),
                asset_type: assets
                    .first()
                    .map(|a| a.asset_type().to_string())
                    .unwrap_or_default(),
                source: e,
            })?;
        Ok(Some(outputs))
    }
}

/// Prepares an asset's AST state for a stage.
///
/// If the asset holds an AST the stage cannot reuse, source is regenerated
/// through the remembered generator (an absent generator is fatal). If the
/// asset then has no AST and the stage parses, the fresh tree is stored.
fn reconcile_ast(
    stage: &PipelineStage,
    generator: Option<&PipelineStage>,
    asset: &mut Asset,
    options: &Options,
    resolver: &dyn Resolver,
) -> Result<(), EngineError> {
    let cx = stage.context(options, resolver);

    let reusable = match asset.ast() {
        Some(ast) => stage.transformer.can_reuse_ast(ast, &cx),
        None => true,
    };
    if !reusable {
        generate_code(generator, asset, stage.transformer.name(), options, resolver)?;
    }

    if asset.ast().is_none() && stage.transformer.capabilities().parse {
        if let Some(ast) = stage
            .transformer
            .parse(asset, &cx)
            .map_err(|e| hook_error(stage, asset, e))?
        {
            asset.set_ast(ast)?;
        }
    }

    Ok(())
}

/// Consumes the asset's AST and writes regenerated source back onto it.
fn generate_code(
    generator: Option<&PipelineStage>,
    asset: &mut Asset,
    requested_by: &str,
    options: &Options,
    resolver: &dyn Resolver,
) -> Result<(), EngineError> {
    let Some(ast) = asset.take_ast()? else {
        return Ok(());
    };
    let Some(gen_stage) = generator else {
        return Err(AstReuseError {
            stage: requested_by.to_string(),
            file_path: asset.file_path().to_path_buf(),
            dialect: ast.dialect,
        }
        .into());
    };

    let cx = gen_stage.context(options, resolver);
    let generated = gen_stage
        .transformer
        .generate(asset, &ast, &cx)
        .map_err(|e| hook_error(gen_stage, asset, e))?;
    asset.set_code(generated.code)?;

    if options.source_maps {
        if let Some(map) = generated.map {
            let mut meta = asset.meta().clone();
            if !meta.is_object() {
                meta = serde_json::json!({});
            }
            meta["source_map"] = map;
            asset.set_meta(meta)?;
        }
    }

    Ok(())
}

/// Normalizes a [`TransformResult::Forward`] into a result descriptor by
/// reading the asset's current state.
///
/// Dependencies, connected files, and symbols stay empty here because
/// `create_child` inherits them from the same asset.
fn forward_output(asset: &mut Asset) -> Result<TransformOutput, EngineError> {
    let ast = asset.take_ast()?;
    Ok(TransformOutput {
        asset_type: asset.asset_type().to_string(),
        content: asset.content().clone(),
        content_hash: asset.content_hash(),
        size: asset.size(),
        ast,
        dependencies: Vec::new(),
        connected_files: Vec::new(),
        symbols: BTreeMap::new(),
        side_effects: Some(asset.side_effects()),
        is_isolated: asset.is_isolated(),
        meta: asset.meta().clone(),
        env: Some(Arc::clone(asset.env())),
    })
}

fn hook_error(stage: &PipelineStage, asset: &Asset, source: HookError) -> TransformerError {
    TransformerError {
        stage: stage.transformer.name().to_string(),
        file_path: asset.file_path().to_path_buf(),
        asset_type: asset.asset_type().to_string(),
        source,
    }
}

/// Registry of transformers plus the extension rules that select them.
///
/// Plugin discovery is the host's concern; the engine consumes its result as
/// a populated map. Selection is by file extension, which is also how
/// type-change re-dispatch finds the pipeline for an intermediate type.
#[derive(Default)]
pub struct PipelineMap {
    transformers: BTreeMap<String, Arc<dyn Transformer>>,
    rules: BTreeMap<String, Vec<String>>,
}

impl PipelineMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transformer under its name.
    pub fn register(&mut self, transformer: Arc<dyn Transformer>) {
        self.transformers
            .insert(transformer.name().to_string(), transformer);
    }

    /// Maps a file extension to an ordered chain of transformer names.
    pub fn map_extension(&mut self, ext: impl Into<String>, stage_names: &[&str]) {
        self.rules.insert(
            ext.into(),
            stage_names.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Selects the transformer chain for a path by its extension.
    ///
    /// Returns `None` if no rule matches or a named transformer is not
    /// registered.
    pub fn select(&self, path: &Path) -> Option<Vec<Arc<dyn Transformer>>> {
        let ext = path.extension()?.to_str()?;
        let names = self.rules.get(ext)?;
        names
            .iter()
            .map(|name| self.transformers.get(name).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use strata_asset::{Ast, Environment, EnvironmentContext};
    use strata_source::SourceContent;

    use crate::transformer::{Capabilities, Generated};

    struct NoResolve;

    impl Resolver for NoResolve {
        fn resolve(&self, _from: &Path, specifier: &str) -> Result<PathBuf, HookError> {
            Ok(PathBuf::from(specifier))
        }
    }

    fn options() -> Options {
        Options::new("/proj")
    }

    fn make_asset(path: &str, code: &str) -> Asset {
        Asset::new_source(
            path,
            PathBuf::from(path),
            SourceContent::from_inline(code),
            Arc::new(Environment::new(EnvironmentContext::Browser)),
            true,
        )
    }

    fn stage(transformer: Arc<dyn Transformer>) -> PipelineStage {
        PipelineStage {
            transformer,
            config: None,
        }
    }

    /// Uppercases code, carries the asset forward.
    struct Upper;

    impl Transformer for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn transform(
            &self,
            asset: &mut Asset,
            _cx: &StageContext<'_>,
        ) -> Result<Vec<TransformResult>, HookError> {
            let code = asset.code()?.to_uppercase();
            asset.set_code(code)?;
            Ok(vec![TransformResult::Forward])
        }
    }

    /// Parses into a toy AST, annotates it, generates on demand.
    struct AstStage {
        name: &'static str,
        reuse: bool,
        parses: AtomicUsize,
        generates: AtomicUsize,
    }

    impl AstStage {
        fn new(name: &'static str, reuse: bool) -> Self {
            Self {
                name,
                reuse,
                parses: AtomicUsize::new(0),
                generates: AtomicUsize::new(0),
            }
        }
    }

    impl Transformer for AstStage {
        fn name(&self) -> &str {
            self.name
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                parse: true,
                generate: true,
                ..Capabilities::default()
            }
        }

        fn can_reuse_ast(&self, ast: &Ast, _cx: &StageContext<'_>) -> bool {
            self.reuse && ast.matches("toy", "1")
        }

        fn parse(
            &self,
            asset: &mut Asset,
            _cx: &StageContext<'_>,
        ) -> Result<Option<Ast>, HookError> {
            self.parses.fetch_add(1, Ordering::SeqCst);
            let code = asset.code()?;
            Ok(Some(Ast::new("toy", "1", json!({ "code": code, "notes": [] }))))
        }

        fn transform(
            &self,
            asset: &mut Asset,
            _cx: &StageContext<'_>,
        ) -> Result<Vec<TransformResult>, HookError> {
            if let Some(ast) = asset.ast_mut()? {
                let notes = ast.program["notes"]
                    .as_array_mut()
                    .ok_or("malformed toy ast")?;
                notes.push(json!(self.name));
            }
            Ok(vec![TransformResult::Forward])
        }

        fn generate(
            &self,
            _asset: &Asset,
            ast: &Ast,
            _cx: &StageContext<'_>,
        ) -> Result<Generated, HookError> {
            self.generates.fetch_add(1, Ordering::SeqCst);
            let code = ast.program["code"].as_str().ok_or("malformed toy ast")?;
            let notes = ast.program["notes"]
                .as_array()
                .ok_or("malformed toy ast")?
                .iter()
                .filter_map(|n| n.as_str())
                .collect::<Vec<_>>()
                .join("+");
            Ok(Generated {
                code: format!("{code}|{notes}"),
                map: Some(json!({ "mappings": "AAAA" })),
            })
        }
    }

    /// Emits a child of a different type.
    struct Retype {
        to: &'static str,
    }

    impl Transformer for Retype {
        fn name(&self) -> &str {
            "retype"
        }

        fn transform(
            &self,
            asset: &mut Asset,
            _cx: &StageContext<'_>,
        ) -> Result<Vec<TransformResult>, HookError> {
            let code = asset.code()?;
            Ok(vec![TransformResult::Output(TransformOutput::code(
                self.to, code,
            ))])
        }
    }

    #[test]
    fn pipeline_id_joins_stage_names() {
        let p = Pipeline::new(
            "js",
            vec![stage(Arc::new(Upper)), stage(Arc::new(Retype { to: "js" }))],
        );
        assert_eq!(p.id(), "upper,retype");
    }

    #[test]
    fn straight_through_forward() {
        let p = Pipeline::new("js", vec![stage(Arc::new(Upper))]);
        let out = p
            .transform(make_asset("a.js", "hello"), &options(), &NoResolve)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code().unwrap(), "HELLO");
        assert_eq!(out[0].asset_type(), "js");
    }

    #[test]
    fn ast_reused_between_compatible_stages() {
        let one = Arc::new(AstStage::new("one", true));
        let two = Arc::new(AstStage::new("two", true));
        let p = Pipeline::new(
            "js",
            vec![stage(one.clone() as _), stage(two.clone() as _)],
        );

        let out = p
            .transform(make_asset("a.js", "src"), &options(), &NoResolve)
            .unwrap();

        // Stage two accepted stage one's tree: one parse, one generate (at
        // the end of the pipeline), and both annotations visible.
        assert_eq!(one.parses.load(Ordering::SeqCst), 1);
        assert_eq!(two.parses.load(Ordering::SeqCst), 0);
        assert_eq!(
            one.generates.load(Ordering::SeqCst) + two.generates.load(Ordering::SeqCst),
            1
        );
        assert_eq!(out[0].code().unwrap(), "src|one+two");
        assert!(out[0].ast().is_none());
    }

    #[test]
    fn ast_rejected_regenerates_and_reparses() {
        let one = Arc::new(AstStage::new("one", true));
        let two = Arc::new(AstStage::new("two", false));
        let p = Pipeline::new(
            "js",
            vec![stage(one.clone() as _), stage(two.clone() as _)],
        );

        let out = p
            .transform(make_asset("a.js", "src"), &options(), &NoResolve)
            .unwrap();

        // Stage one's generator fired between the stages, stage two parsed
        // fresh from the regenerated source.
        assert_eq!(one.generates.load(Ordering::SeqCst), 1);
        assert_eq!(two.parses.load(Ordering::SeqCst), 1);
        assert_eq!(out[0].code().unwrap(), "src|one|two");
    }

    #[test]
    fn ast_without_generator_is_fatal() {
        /// Produces an AST but declares no generator.
        struct BadParser;

        impl Transformer for BadParser {
            fn name(&self) -> &str {
                "bad-parser"
            }

            fn capabilities(&self) -> Capabilities {
                Capabilities {
                    parse: true,
                    ..Capabilities::default()
                }
            }

            fn parse(
                &self,
                _asset: &mut Asset,
                _cx: &StageContext<'_>,
            ) -> Result<Option<Ast>, HookError> {
                Ok(Some(Ast::new("toy", "1", json!({}))))
            }

            fn transform(
                &self,
                _asset: &mut Asset,
                _cx: &StageContext<'_>,
            ) -> Result<Vec<TransformResult>, HookError> {
                Ok(vec![TransformResult::Forward])
            }
        }

        let p = Pipeline::new("js", vec![stage(Arc::new(BadParser))]);
        let err = p
            .transform(make_asset("a.js", "src"), &options(), &NoResolve)
            .unwrap_err();
        assert!(matches!(err, EngineError::AstReuse(_)));
    }

    #[test]
    fn generated_source_map_lands_on_the_asset() {
        let one = Arc::new(AstStage::new("one", true));
        let p = Pipeline::new("js", vec![stage(one as _)]);
        let out = p
            .transform(make_asset("a.js", "src"), &options(), &NoResolve)
            .unwrap();
        assert_eq!(out[0].map().unwrap()["mappings"], "AAAA");
    }

    #[test]
    fn source_maps_disabled_drops_the_map() {
        let one = Arc::new(AstStage::new("one", true));
        let p = Pipeline::new("js", vec![stage(one as _)]);
        let mut opts = options();
        opts.source_maps = false;
        let out = p
            .transform(make_asset("a.js", "src"), &opts, &NoResolve)
            .unwrap();
        assert!(out[0].map().is_none());
    }

    #[test]
    fn diverged_asset_skips_remaining_stages() {
        let counted = Arc::new(AstStage::new("counted", true));
        let p = Pipeline::new(
            "ts",
            vec![
                stage(Arc::new(Retype { to: "js" })),
                stage(counted.clone() as _),
            ],
        );

        let out = p
            .transform(make_asset("a.ts", "code"), &options(), &NoResolve)
            .unwrap();

        // The js child diverged after stage one; stage two never saw it.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].asset_type(), "js");
        assert_eq!(counted.parses.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn divergence_on_last_stage_yields_asset_once() {
        let p = Pipeline::new("ts", vec![stage(Arc::new(Retype { to: "js" }))]);
        let out = p
            .transform(make_asset("a.ts", "code"), &options(), &NoResolve)
            .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn transform_error_carries_stage_context() {
        struct Failing;

        impl Transformer for Failing {
            fn name(&self) -> &str {
                "failing"
            }

            fn transform(
                &self,
                _asset: &mut Asset,
                _cx: &StageContext<'_>,
            ) -> Result<Vec<TransformResult>, HookError> {
                Err("boom".into())
            }
        }

        let p = Pipeline::new("js", vec![stage(Arc::new(Failing))]);
        let err = p
            .transform(make_asset("a.js", "x"), &options(), &NoResolve)
            .unwrap_err();
        match err {
            EngineError::Transformer(e) => {
                assert_eq!(e.stage, "failing");
                assert_eq!(e.asset_type, "js");
                assert_eq!(e.file_path, PathBuf::from("a.js"));
            }
            other => panic!("expected transformer error, got {other:?}"),
        }
    }

    #[test]
    fn forward_inherits_dependencies_through_stages() {
        struct AddDep;

        impl Transformer for AddDep {
            fn name(&self) -> &str {
                "add-dep"
            }

            fn transform(
                &self,
                asset: &mut Asset,
                _cx: &StageContext<'_>,
            ) -> Result<Vec<TransformResult>, HookError> {
                let env = Arc::clone(asset.env());
                let from = asset.file_path().to_path_buf();
                asset.add_dependency(strata_asset::Dependency {
                    specifier: "./dep".to_string(),
                    kind: strata_asset::DependencyKind::Import,
                    source_path: Some(from),
                    env,
                })?;
                Ok(vec![TransformResult::Forward])
            }
        }

        let p = Pipeline::new(
            "js",
            vec![stage(Arc::new(AddDep)), stage(Arc::new(Upper))],
        );
        let out = p
            .transform(make_asset("a.js", "x"), &options(), &NoResolve)
            .unwrap();
        assert_eq!(out[0].dependencies().len(), 1);
        assert_eq!(out[0].dependencies()[0].specifier, "./dep");
    }

    #[test]
    fn pipeline_map_selects_by_extension() {
        let mut map = PipelineMap::new();
        map.register(Arc::new(Upper));
        map.map_extension("js", &["upper"]);

        assert!(map.select(Path::new("src/app.js")).is_some());
        assert!(map.select(Path::new("src/app.css")).is_none());
        assert!(map.select(Path::new("no_extension")).is_none());
    }

    #[test]
    fn pipeline_map_missing_transformer_is_none() {
        let mut map = PipelineMap::new();
        map.map_extension("js", &["ghost"]);
        assert!(map.select(Path::new("a.js")).is_none());
    }
}
