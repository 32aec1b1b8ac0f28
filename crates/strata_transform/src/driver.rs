//! The top-level transformation driver.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_asset::{Asset, CachedAsset, Environment};
use strata_cache::{Cache, CacheKey};
use strata_config::{ConfigRequest, ConfigSource, ReloadMode};
use strata_source::SourceContent;
use tracing::debug;

use crate::error::{EngineError, RequestError};
use crate::options::Options;
use crate::pipeline::{Pipeline, PipelineMap, PipelineStage};
use crate::transformer::Resolver;

/// Engine version stamped into artifact headers; entries from other
/// releases read as cache misses.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A request to transform one source file or inline code blob.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    /// The source file path. Also used for pipeline selection when the
    /// request carries inline code.
    pub file_path: PathBuf,

    /// Inline code to transform instead of the file's contents. Identity
    /// derives from the code's hash, and cache reads are skipped.
    pub inline_code: Option<String>,

    /// The target environment, shared with every produced asset.
    pub env: Arc<Environment>,

    /// Default side-effects flag for the initial asset.
    pub side_effects: bool,

    /// Config requests recorded by a previous run of this request.
    ///
    /// Each carries the reload marker its config asked for; the driver
    /// re-invokes the host loader with that recorded mode instead of the
    /// default full reload.
    pub prior_config_requests: Vec<ConfigRequest>,
}

impl TransformRequest {
    /// Creates a file request for the given path and environment.
    pub fn file(file_path: impl Into<PathBuf>, env: Arc<Environment>) -> Self {
        Self {
            file_path: file_path.into(),
            inline_code: None,
            env,
            side_effects: true,
            prior_config_requests: Vec::new(),
        }
    }

    /// Attaches the config requests recorded by a previous run, so their
    /// reload markers are honored on this one.
    pub fn with_prior_config_requests(mut self, requests: Vec<ConfigRequest>) -> Self {
        self.prior_config_requests = requests;
        self
    }
}

/// The result of one transformation request.
#[derive(Debug)]
pub struct TransformationOutput {
    /// The final, committed assets.
    pub assets: Vec<Asset>,

    /// Every config the engine asked the host for, in request order, for
    /// dependency tracking by the outer graph.
    pub config_requests: Vec<ConfigRequest>,
}

/// Orchestrates one transformation request end to end.
///
/// Loads the content, selects and runs the pipeline, re-dispatches assets
/// whose type changed, runs postprocessing, and mediates every cache read
/// and write. A driver is re-entrant: `run` takes `&self`, and concurrent
/// requests share only the cache, the config callback, and the resolver,
/// each of which is internally thread-safe.
pub struct Driver {
    cache: Cache,
    pipelines: Arc<PipelineMap>,
    config_source: Arc<dyn ConfigSource>,
    resolver: Arc<dyn Resolver>,
    options: Options,
}

impl Driver {
    /// Creates a driver, opening the cache under `options.cache_dir`.
    pub fn new(
        options: Options,
        pipelines: Arc<PipelineMap>,
        config_source: Arc<dyn ConfigSource>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        let cache = Cache::open(&options.cache_dir, ENGINE_VERSION);
        Self {
            cache,
            pipelines,
            config_source,
            resolver,
            options,
        }
    }

    /// The driver's cache handle.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Runs one transformation request.
    ///
    /// The request either yields a full, committed asset set or fails as a
    /// whole; no partial set is ever returned, and failed runs write
    /// nothing to the artifact cache.
    pub fn run(&self, request: &TransformRequest) -> Result<TransformationOutput, RequestError> {
        self.run_inner(request).map_err(|source| RequestError {
            file_path: request.file_path.clone(),
            source,
        })
    }

    fn run_inner(&self, request: &TransformRequest) -> Result<TransformationOutput, EngineError> {
        let (id_base, source) = match &request.inline_code {
            Some(code) => {
                let source = SourceContent::from_inline(code);
                (source.hash.to_string(), source)
            }
            None => (
                request.file_path.to_string_lossy().into_owned(),
                SourceContent::read_path(&request.file_path)?,
            ),
        };
        let initial = Asset::new_source(
            &id_base,
            request.file_path.clone(),
            source,
            Arc::clone(&request.env),
            request.side_effects,
        );

        let prior_modes: BTreeMap<&str, ReloadMode> = request
            .prior_config_requests
            .iter()
            .map(|r| (r.package_name.as_str(), r.reload_mode))
            .collect();

        let mut config_requests = Vec::new();
        let pipeline =
            self.load_pipeline(&request.file_path, &prior_modes, &mut config_requests)?;
        let cache_reads = self.options.cache && request.inline_code.is_none();

        let mut assets = self.transform_with_cache(
            initial,
            &pipeline,
            cache_reads,
            &prior_modes,
            &mut config_requests,
        )?;

        if pipeline.has_post_process() && !assets.is_empty() {
            assets = self.post_process_with_cache(assets, &pipeline, cache_reads)?;
        }

        let options_hash = self.options.impactful_hash();
        for asset in &mut assets {
            asset.commit(&self.cache, &options_hash)?;
        }

        Ok(TransformationOutput {
            assets,
            config_requests,
        })
    }

    /// Loads the pipeline for a path, obtaining configs for every stage
    /// that requires one and recording the requests.
    ///
    /// `prior_modes` holds the reload markers recorded by a previous run;
    /// a stage found there has its loader re-invoked in that mode, and a
    /// stage with no prior record gets a full reload.
    fn load_pipeline(
        &self,
        path: &Path,
        prior_modes: &BTreeMap<&str, ReloadMode>,
        config_requests: &mut Vec<ConfigRequest>,
    ) -> Result<Pipeline, EngineError> {
        let chain = self
            .pipelines
            .select(path)
            .ok_or_else(|| EngineError::NoPipeline {
                path: path.to_path_buf(),
            })?;
        let initial_type = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();

        let mut stages = Vec::with_capacity(chain.len());
        for transformer in chain {
            let config = if transformer.capabilities().load_config {
                let recorded_mode = prior_modes
                    .get(transformer.name())
                    .copied()
                    .unwrap_or(ReloadMode::Reload);
                let mut request = ConfigRequest {
                    package_name: transformer.name().to_string(),
                    file_path: path.to_path_buf(),
                    reload_mode: recorded_mode,
                };
                let config = self.config_source.load_config(&request)?;
                // The recorded request carries the config's own marker so
                // the next run re-invokes the loader in the right mode.
                request.reload_mode = config.reload_mode;
                config_requests.push(request);
                Some(config)
            } else {
                None
            };
            stages.push(PipelineStage {
                transformer,
                config,
            });
        }

        Ok(Pipeline::new(initial_type, stages))
    }

    /// Runs one asset through one pipeline with cache mediation, then
    /// re-dispatches any result whose type diverged.
    ///
    /// Re-dispatch rule: the next pipeline is selected from a synthetic
    /// path, the asset's original stem with the new type as extension. A
    /// next pipeline with the same id means the asset is already final.
    fn transform_with_cache(
        &self,
        initial: Asset,
        pipeline: &Pipeline,
        cache_reads: bool,
        prior_modes: &BTreeMap<&str, ReloadMode>,
        config_requests: &mut Vec<ConfigRequest>,
    ) -> Result<Vec<Asset>, EngineError> {
        let key = self.key_for(&initial, pipeline);

        let restored = if cache_reads { self.lookup(&key) } else { None };
        let assets = match restored {
            Some(assets) => {
                debug!(path = %initial.file_path().display(), "pipeline served from cache");
                assets
            }
            None => {
                let produced =
                    pipeline.transform(initial, &self.options, self.resolver.as_ref())?;
                self.store(&key, &produced)?;
                produced
            }
        };

        let mut out = Vec::new();
        for asset in assets {
            if asset.asset_type() != pipeline.initial_type() {
                let next_path = asset.file_path().with_extension(asset.asset_type());
                let next_pipeline =
                    self.load_pipeline(&next_path, prior_modes, config_requests)?;
                if next_pipeline.id() != pipeline.id() {
                    debug!(
                        from = pipeline.initial_type(),
                        to = asset.asset_type(),
                        next = %next_path.display(),
                        "type change re-dispatch"
                    );
                    out.extend(self.transform_with_cache(
                        asset,
                        &next_pipeline,
                        cache_reads,
                        prior_modes,
                        config_requests,
                    )?);
                    continue;
                }
            }
            out.push(asset);
        }
        Ok(out)
    }

    /// Runs the pipeline's postprocessor over the finalized asset set with
    /// its own cache mediation, keyed over that same finalized set.
    fn post_process_with_cache(
        &self,
        assets: Vec<Asset>,
        pipeline: &Pipeline,
        cache_reads: bool,
    ) -> Result<Vec<Asset>, EngineError> {
        let fingerprints: Vec<_> = assets.iter().map(|a| a.fingerprint()).collect();
        let env_bytes = assets[0].env().canonical_bytes();
        let key = CacheKey::compute(
            &fingerprints,
            &pipeline.config_fingerprints(),
            &env_bytes,
            &self.options.impactful_bytes(),
        );

        if cache_reads {
            if let Some(cached) = self.lookup(&key) {
                debug!("postprocess served from cache");
                return Ok(cached);
            }
        }

        let Some(outputs) =
            pipeline.post_process(&assets, &self.options, self.resolver.as_ref())?
        else {
            return Ok(assets);
        };

        let parent = &assets[0];
        let processed: Vec<Asset> = outputs
            .into_iter()
            .map(|output| parent.create_child(output))
            .collect();
        self.store(&key, &processed)?;
        Ok(processed)
    }

    /// The pre-pipeline cache key for one initial asset.
    fn key_for(&self, asset: &Asset, pipeline: &Pipeline) -> CacheKey {
        CacheKey::compute(
            &[asset.fingerprint()],
            &pipeline.config_fingerprints(),
            &asset.env().canonical_bytes(),
            &self.options.impactful_bytes(),
        )
    }

    /// Loads and rebuilds a cached asset list, materializing each asset's
    /// bytes from the blob store. Any missing piece is a miss.
    fn lookup(&self, key: &CacheKey) -> Option<Vec<Asset>> {
        let payload = self.cache.get_artifact(key)?;
        let records = CachedAsset::decode_list(&payload)?;
        let mut assets = Vec::with_capacity(records.len());
        for record in &records {
            assets.push(record.restore(&self.cache)?);
        }
        Some(assets)
    }

    /// Commits a snapshot of each asset (writing its blob) and stores the
    /// record list under the key.
    ///
    /// The assets handed in stay mutable: a later pipeline may transform
    /// them further, and the final commit of unchanged bytes rewrites the
    /// same blob key.
    fn store(&self, key: &CacheKey, assets: &[Asset]) -> Result<(), EngineError> {
        let options_hash = self.options.impactful_hash();
        let mut records = Vec::with_capacity(assets.len());
        for asset in assets {
            let mut committed = asset.clone();
            committed.commit(&self.cache, &options_hash)?;
            records.extend(CachedAsset::capture(&committed));
        }
        let payload = CachedAsset::encode_list(&records)?;
        self.cache.put_artifact(key, &payload)?;
        Ok(())
    }
}
