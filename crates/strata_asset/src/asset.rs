//! The mutable asset record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_cache::{AssetFingerprint, Cache};
use strata_common::{ContentHash, ContentHasher};
use strata_source::{ContentReadError, FileContent, SourceContent};

use crate::ast::Ast;
use crate::dependency::{ConnectedFile, Dependency};
use crate::env::Environment;
use crate::error::AssetError;
use crate::output::TransformOutput;

/// Timing and size statistics for one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStats {
    /// Total time spent in transformer hooks on this asset, in milliseconds.
    pub transform_ms: u64,

    /// Final content size in bytes, recorded at commit.
    pub size: u64,
}

/// One unit of source content flowing through the engine.
///
/// The record is mutable while a pipeline runs; transformers receive
/// `&mut Asset` only inside their hook calls, which is the capability that
/// authorizes mutation. [`commit`](Asset::commit) freezes the record: any
/// later mutation fails with [`AssetError::Frozen`].
///
/// Not thread-safe by design: one asset belongs to exactly one
/// transformation request, which runs sequentially.
#[derive(Debug, Clone)]
pub struct Asset {
    id: String,
    file_path: PathBuf,
    asset_type: String,
    content: FileContent,
    size: u64,
    content_hash: ContentHash,
    ast: Option<Ast>,
    env: Arc<Environment>,
    dependencies: Vec<Dependency>,
    connected_files: Vec<ConnectedFile>,
    symbols: BTreeMap<String, String>,
    side_effects: bool,
    is_isolated: bool,
    meta: Value,
    stats: AssetStats,
    output_hash: Option<ContentHash>,
    committed: bool,
}

impl Asset {
    /// Constructs the initial asset of a transformation request.
    ///
    /// `id_base` is the request's identity root: the file path for on-disk
    /// sources, the content hash for inline code. The type tag defaults to
    /// the file extension.
    pub fn new_source(
        id_base: &str,
        file_path: PathBuf,
        source: SourceContent,
        env: Arc<Environment>,
        side_effects: bool,
    ) -> Self {
        let asset_type = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let id = compute_id(id_base, &asset_type, &env);

        Self {
            id,
            file_path,
            asset_type,
            content: source.content,
            size: source.size,
            content_hash: source.hash,
            ast: None,
            env,
            dependencies: Vec::new(),
            connected_files: Vec::new(),
            symbols: BTreeMap::new(),
            side_effects,
            is_isolated: false,
            meta: Value::Null,
            stats: AssetStats::default(),
            output_hash: None,
            committed: false,
        }
    }

    /// Constructs a child asset from a transformer's result descriptor.
    ///
    /// The child's identity root combines this asset's id with the child's
    /// type. Dependencies, connected files, symbols, and (unless overridden)
    /// the environment and side-effects flag are inherited; content, AST,
    /// type, isolation, and metadata come from the descriptor.
    pub fn create_child(&self, output: TransformOutput) -> Self {
        let id_base = format!("{}:{}", self.id, output.asset_type);
        let env = output.env.unwrap_or_else(|| Arc::clone(&self.env));
        let id = compute_id(&id_base, &output.asset_type, &env);

        let mut dependencies = self.dependencies.clone();
        dependencies.extend(output.dependencies);
        let mut connected_files = self.connected_files.clone();
        connected_files.extend(output.connected_files);
        let mut symbols = self.symbols.clone();
        symbols.extend(output.symbols);

        Self {
            id,
            file_path: self.file_path.clone(),
            asset_type: output.asset_type,
            content: output.content,
            size: output.size,
            content_hash: output.content_hash,
            ast: output.ast,
            env,
            dependencies,
            connected_files,
            symbols,
            side_effects: output.side_effects.unwrap_or(self.side_effects),
            is_isolated: output.is_isolated,
            meta: if output.meta.is_null() {
                self.meta.clone()
            } else {
                output.meta
            },
            stats: AssetStats::default(),
            output_hash: None,
            committed: false,
        }
    }

    /// Rebuilds an asset from a cached record's parts, preserving the
    /// record's stored id instead of recomputing one.
    pub(crate) fn restore_record(
        id: String,
        file_path: PathBuf,
        env: Arc<Environment>,
        output: TransformOutput,
        stats: AssetStats,
    ) -> Self {
        Self {
            id,
            file_path,
            asset_type: output.asset_type,
            content: output.content,
            size: output.size,
            content_hash: output.content_hash,
            ast: output.ast,
            env,
            dependencies: output.dependencies,
            connected_files: output.connected_files,
            symbols: output.symbols,
            side_effects: output.side_effects.unwrap_or(true),
            is_isolated: output.is_isolated,
            meta: output.meta,
            stats,
            output_hash: None,
            committed: false,
        }
    }

    // --- Read view ---

    /// The asset's stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The file path the asset originated from.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// The asset's current type tag.
    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    /// The asset's current content representation.
    pub fn content(&self) -> &FileContent {
        &self.content
    }

    /// The asset's current content size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hash of the asset's current content bytes.
    pub fn content_hash(&self) -> ContentHash {
        self.content_hash
    }

    /// The asset's AST, if one is held.
    ///
    /// While an AST is held the textual content is stale: it reflects the
    /// state before the last parse, until a generator writes it back.
    pub fn ast(&self) -> Option<&Ast> {
        self.ast.as_ref()
    }

    /// The build environment, shared with the originating request.
    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Dependencies accumulated so far, in discovery order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Connected files accumulated so far.
    pub fn connected_files(&self) -> &[ConnectedFile] {
        &self.connected_files
    }

    /// Exported symbol → local name mappings.
    pub fn symbols(&self) -> &BTreeMap<String, String> {
        &self.symbols
    }

    /// Whether the asset has (or must be assumed to have) side effects.
    pub fn side_effects(&self) -> bool {
        self.side_effects
    }

    /// Whether the asset must be kept isolated from sibling assets.
    pub fn is_isolated(&self) -> bool {
        self.is_isolated
    }

    /// Metadata for downstream stages.
    pub fn meta(&self) -> &Value {
        &self.meta
    }

    /// The asset's source map, when a generator emitted one.
    pub fn map(&self) -> Option<&Value> {
        self.meta.get("source_map")
    }

    /// Timing and size statistics.
    pub fn stats(&self) -> &AssetStats {
        &self.stats
    }

    /// The commit-time output hash, if the asset has been committed.
    pub fn output_hash(&self) -> Option<ContentHash> {
        self.output_hash
    }

    /// Whether the asset has been committed (and is therefore frozen).
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Materializes the content as a UTF-8 string, re-opening a stream if
    /// necessary.
    pub fn code(&self) -> Result<String, AssetError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|_| AssetError::InvalidUtf8 {
            id: self.id.clone(),
        })
    }

    /// Materializes the content as bytes, re-opening a stream if necessary.
    pub fn bytes(&self) -> Result<Vec<u8>, AssetError> {
        Ok(self.content.read_bytes()?)
    }

    /// The asset's slice of a cache key.
    pub fn fingerprint(&self) -> AssetFingerprint {
        AssetFingerprint {
            file_path: self.file_path.clone(),
            asset_type: self.asset_type.clone(),
            hash: self.content_hash,
        }
    }

    // --- Mutable view (fails after commit) ---

    /// Replaces the content with UTF-8 code.
    pub fn set_code(&mut self, code: impl Into<String>) -> Result<(), AssetError> {
        self.set_bytes(code.into().into_bytes())
    }

    /// Replaces the content with bytes.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.size = bytes.len() as u64;
        self.content_hash = ContentHash::from_bytes(&bytes);
        self.content = FileContent::Buffer(bytes);
        Ok(())
    }

    /// Replaces the content with a re-openable stream handle.
    ///
    /// `size` and `hash` describe the streamed bytes; they were computed by
    /// the one-pass load and remain authoritative.
    pub fn set_stream(
        &mut self,
        path: PathBuf,
        size: u64,
        hash: ContentHash,
    ) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.size = size;
        self.content_hash = hash;
        self.content = FileContent::Stream(path);
        Ok(())
    }

    /// Stores an AST on the asset, replacing any previous one.
    pub fn set_ast(&mut self, ast: Ast) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.ast = Some(ast);
        Ok(())
    }

    /// Mutable access to the held AST.
    pub fn ast_mut(&mut self) -> Result<Option<&mut Ast>, AssetError> {
        self.check_mutable()?;
        Ok(self.ast.as_mut())
    }

    /// Removes and returns the held AST.
    pub fn take_ast(&mut self) -> Result<Option<Ast>, AssetError> {
        self.check_mutable()?;
        Ok(self.ast.take())
    }

    /// Appends a dependency record.
    pub fn add_dependency(&mut self, dep: Dependency) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.dependencies.push(dep);
        Ok(())
    }

    /// Registers an ancillary file whose contents influence this asset.
    ///
    /// A re-registration of the same path replaces the recorded hash.
    pub fn add_connected_file(
        &mut self,
        path: PathBuf,
        hash: ContentHash,
    ) -> Result<(), AssetError> {
        self.check_mutable()?;
        if let Some(existing) = self.connected_files.iter_mut().find(|cf| cf.path == path) {
            existing.hash = hash;
        } else {
            self.connected_files.push(ConnectedFile { path, hash });
        }
        Ok(())
    }

    /// Records an exported symbol mapping.
    pub fn add_symbol(
        &mut self,
        exported: impl Into<String>,
        local: impl Into<String>,
    ) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.symbols.insert(exported.into(), local.into());
        Ok(())
    }

    /// Sets the side-effects flag.
    pub fn set_side_effects(&mut self, side_effects: bool) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.side_effects = side_effects;
        Ok(())
    }

    /// Sets the isolation flag.
    pub fn set_is_isolated(&mut self, is_isolated: bool) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.is_isolated = is_isolated;
        Ok(())
    }

    /// Replaces the metadata value.
    pub fn set_meta(&mut self, meta: Value) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.meta = meta;
        Ok(())
    }

    /// Adds hook time to the asset's statistics.
    pub fn add_transform_time(&mut self, elapsed: Duration) -> Result<(), AssetError> {
        self.check_mutable()?;
        self.stats.transform_ms += elapsed.as_millis() as u64;
        Ok(())
    }

    /// Reads the first existing file from `candidates`, registers it as a
    /// connected file, and returns its parsed JSON value.
    ///
    /// Returns `Ok(None)` if no candidate exists.
    pub fn read_config(
        &mut self,
        candidates: &[PathBuf],
    ) -> Result<Option<Value>, AssetError> {
        self.check_mutable()?;
        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            let bytes = std::fs::read(candidate)
                .map_err(|e| ContentReadError::new(candidate.clone(), e))?;
            let hash = ContentHash::from_bytes(&bytes);
            self.add_connected_file(candidate.clone(), hash)?;
            let value: Value =
                serde_json::from_slice(&bytes).map_err(|e| AssetError::ConfigParse {
                    path: candidate.clone(),
                    reason: e.to_string(),
                })?;
            return Ok(Some(value));
        }
        Ok(None)
    }

    /// Finalizes the asset: computes the output hash over the final bytes
    /// and the impactful-options hash, writes the bytes to the blob cache,
    /// and freezes the record.
    ///
    /// Committing an already-committed asset is a no-op; committing the same
    /// bytes twice rewrites the same blob key.
    pub fn commit(&mut self, cache: &Cache, options_hash: &ContentHash) -> Result<(), AssetError> {
        if self.committed {
            return Ok(());
        }

        // The pipeline has already generated code for any held AST; a
        // leftover tree is consumed here.
        self.ast = None;

        let bytes = self.bytes()?;
        let mut hasher = ContentHasher::new();
        hasher.update(&bytes);
        hasher.update(options_hash.as_raw());
        let output_hash = hasher.finish();

        cache.write_blob(&output_hash, &bytes)?;

        self.stats.size = bytes.len() as u64;
        self.output_hash = Some(output_hash);
        self.committed = true;
        Ok(())
    }

    fn check_mutable(&self) -> Result<(), AssetError> {
        if self.committed {
            Err(AssetError::Frozen {
                id: self.id.clone(),
            })
        } else {
            Ok(())
        }
    }
}

/// Derives a stable asset id from its identity root, type, and environment.
fn compute_id(id_base: &str, asset_type: &str, env: &Environment) -> String {
    let env_bytes = env.canonical_bytes();
    let mut hasher = ContentHasher::new();
    for field in [id_base.as_bytes(), asset_type.as_bytes(), env_bytes.as_slice()] {
        hasher.update(&(field.len() as u64).to_le_bytes());
        hasher.update(field);
    }
    hasher.finish().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvironmentContext;
    use crate::dependency::DependencyKind;

    fn browser_env() -> Arc<Environment> {
        Arc::new(Environment::new(EnvironmentContext::Browser).with_engine("chrome", ">=80"))
    }

    fn make_asset(path: &str, code: &str) -> Asset {
        Asset::new_source(
            path,
            PathBuf::from(path),
            SourceContent::from_inline(code),
            browser_env(),
            true,
        )
    }

    fn make_cache() -> (tempfile::TempDir, Cache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path(), "0.1.0");
        (dir, cache)
    }

    #[test]
    fn type_defaults_to_extension() {
        let asset = make_asset("src/app.ts", "let x = 1;");
        assert_eq!(asset.asset_type(), "ts");
    }

    #[test]
    fn id_is_stable_for_same_inputs() {
        let a = make_asset("src/app.js", "x");
        let b = make_asset("src/app.js", "y");
        // Content does not participate in identity.
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn id_differs_across_type_and_env() {
        let js = make_asset("src/app.js", "x");
        let ts = make_asset("src/app.ts", "x");
        assert_ne!(js.id(), ts.id());

        let node = Asset::new_source(
            "src/app.js",
            PathBuf::from("src/app.js"),
            SourceContent::from_inline("x"),
            Arc::new(Environment::new(EnvironmentContext::Node)),
            true,
        );
        assert_ne!(js.id(), node.id());
    }

    #[test]
    fn set_code_updates_hash_and_size() {
        let mut asset = make_asset("a.js", "before");
        let old_hash = asset.content_hash();
        asset.set_code("after!").unwrap();
        assert_eq!(asset.size(), 6);
        assert_ne!(asset.content_hash(), old_hash);
        assert_eq!(asset.code().unwrap(), "after!");
    }

    #[test]
    fn child_inherits_env_deps_and_side_effects() {
        let mut parent = make_asset("a.ts", "code");
        parent
            .add_dependency(Dependency {
                specifier: "./util".to_string(),
                kind: DependencyKind::Import,
                source_path: Some(PathBuf::from("a.ts")),
                env: Arc::clone(parent.env()),
            })
            .unwrap();

        let child = parent.create_child(TransformOutput::code("js", "out"));
        assert_eq!(child.asset_type(), "js");
        assert_eq!(child.dependencies().len(), 1);
        assert!(Arc::ptr_eq(child.env(), parent.env()));
        assert_eq!(child.side_effects(), parent.side_effects());
        assert_eq!(child.code().unwrap(), "out");
        assert_ne!(child.id(), parent.id());
    }

    #[test]
    fn child_overrides_apply() {
        let parent = make_asset("a.ts", "code");
        let mut output = TransformOutput::code("js", "out");
        output.side_effects = Some(false);
        output.is_isolated = true;
        let child = parent.create_child(output);
        assert!(!child.side_effects());
        assert!(child.is_isolated());
    }

    #[test]
    fn same_type_children_of_one_parent_share_id() {
        let parent = make_asset("a.js", "code");
        let c1 = parent.create_child(TransformOutput::code("js", "one"));
        let c2 = parent.create_child(TransformOutput::code("js", "two"));
        assert_eq!(c1.id(), c2.id());
    }

    #[test]
    fn commit_freezes_and_writes_blob() {
        let (_dir, cache) = make_cache();
        let mut asset = make_asset("a.txt", "HELLO");
        let options_hash = ContentHash::from_bytes(b"opts");
        asset.commit(&cache, &options_hash).unwrap();

        assert!(asset.is_committed());
        let output_hash = asset.output_hash().unwrap();
        assert_eq!(cache.read_blob(&output_hash).unwrap(), b"HELLO");
        assert_eq!(asset.stats().size, 5);

        let err = asset.set_code("nope").unwrap_err();
        assert!(matches!(err, AssetError::Frozen { .. }));
    }

    #[test]
    fn mutators_fail_after_commit() {
        let (_dir, cache) = make_cache();
        let mut asset = make_asset("a.txt", "x");
        asset.commit(&cache, &ContentHash::from_bytes(b"")).unwrap();

        assert!(matches!(
            asset.add_symbol("a", "b").unwrap_err(),
            AssetError::Frozen { .. }
        ));
        assert!(matches!(
            asset.set_meta(Value::Bool(true)).unwrap_err(),
            AssetError::Frozen { .. }
        ));
        assert!(matches!(
            asset.take_ast().unwrap_err(),
            AssetError::Frozen { .. }
        ));
        assert!(matches!(
            asset
                .add_connected_file(PathBuf::from("x"), ContentHash::from_bytes(b""))
                .unwrap_err(),
            AssetError::Frozen { .. }
        ));
    }

    #[test]
    fn commit_is_idempotent() {
        let (_dir, cache) = make_cache();
        let mut asset = make_asset("a.txt", "same");
        let opts = ContentHash::from_bytes(b"opts");
        asset.commit(&cache, &opts).unwrap();
        let first = asset.output_hash().unwrap();
        asset.commit(&cache, &opts).unwrap();
        assert_eq!(asset.output_hash().unwrap(), first);
    }

    #[test]
    fn distinct_bytes_produce_distinct_blob_keys() {
        let (_dir, cache) = make_cache();
        let opts = ContentHash::from_bytes(b"opts");

        let mut a = make_asset("a.txt", "one");
        a.commit(&cache, &opts).unwrap();
        let mut b = make_asset("a.txt", "two");
        b.commit(&cache, &opts).unwrap();

        assert_ne!(a.output_hash(), b.output_hash());
    }

    #[test]
    fn options_participate_in_output_hash() {
        let (_dir, cache) = make_cache();
        let mut a = make_asset("a.txt", "same");
        let mut b = make_asset("a.txt", "same");
        a.commit(&cache, &ContentHash::from_bytes(b"minify=true"))
            .unwrap();
        b.commit(&cache, &ContentHash::from_bytes(b"minify=false"))
            .unwrap();
        assert_ne!(a.output_hash(), b.output_hash());
    }

    #[test]
    fn commit_consumes_leftover_ast() {
        let (_dir, cache) = make_cache();
        let mut asset = make_asset("a.js", "code");
        asset
            .set_ast(Ast::new("swc", "1.0", serde_json::json!({})))
            .unwrap();
        asset.commit(&cache, &ContentHash::from_bytes(b"")).unwrap();
        assert!(asset.ast().is_none());
    }

    #[test]
    fn read_config_registers_connected_file() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".transformrc");
        std::fs::write(&rc, r#"{"preset": "modern"}"#).unwrap();

        let mut asset = make_asset("a.js", "code");
        let missing = dir.path().join(".missingrc");
        let value = asset
            .read_config(&[missing, rc.clone()])
            .unwrap()
            .expect("config should be found");

        assert_eq!(value["preset"], "modern");
        assert_eq!(asset.connected_files().len(), 1);
        assert_eq!(asset.connected_files()[0].path, rc);
    }

    #[test]
    fn read_config_none_when_no_candidate_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mut asset = make_asset("a.js", "code");
        let value = asset
            .read_config(&[dir.path().join("absent.json")])
            .unwrap();
        assert!(value.is_none());
        assert!(asset.connected_files().is_empty());
    }

    #[test]
    fn connected_file_re_registration_replaces_hash() {
        let mut asset = make_asset("a.js", "code");
        let path = PathBuf::from(".babelrc");
        asset
            .add_connected_file(path.clone(), ContentHash::from_bytes(b"v1"))
            .unwrap();
        asset
            .add_connected_file(path.clone(), ContentHash::from_bytes(b"v2"))
            .unwrap();
        assert_eq!(asset.connected_files().len(), 1);
        assert_eq!(
            asset.connected_files()[0].hash,
            ContentHash::from_bytes(b"v2")
        );
    }
}
