//! Config result and request types.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigLoadError;

/// How a previously loaded config should be brought back on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReloadMode {
    /// The serialized config value can be used as-is.
    Rehydrate,

    /// The config must be re-read from disk by the host loader.
    Reload,
}

/// The result of loading one plugin's configuration.
///
/// Opaque to the engine except for the three fields that participate in
/// cache keys and restart behavior: `result_hash`, `dev_deps`, and the
/// reload marker. `data` is passed through to the plugin's hooks untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// The plugin package this config belongs to.
    pub package_name: String,

    /// Stable bytes identifying the loaded config value.
    pub result_hash: String,

    /// `(package, version)` pairs the config load depended on. The ordered
    /// set keeps cache-key serialization canonical.
    pub dev_deps: BTreeSet<(String, String)>,

    /// Whether this config survives restarts as-is or must be reloaded.
    pub reload_mode: ReloadMode,

    /// The config value itself; not interpreted by the engine.
    pub data: serde_json::Value,
}

impl PluginConfig {
    /// Creates an empty config for the given package.
    ///
    /// `result_hash` defaults to the empty string, `reload_mode` to
    /// [`ReloadMode::Rehydrate`].
    pub fn empty(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            result_hash: String::new(),
            dev_deps: BTreeSet::new(),
            reload_mode: ReloadMode::Rehydrate,
            data: serde_json::Value::Null,
        }
    }
}

/// A recorded request for one plugin's config.
///
/// The engine records every config it asked the host for, so the outer graph
/// can track the transformation's dependency on those loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequest {
    /// The plugin package whose config is requested.
    pub package_name: String,

    /// The asset path whose pipeline needed the config.
    pub file_path: PathBuf,

    /// The reload mode to honor when re-invoking the loader on restart.
    pub reload_mode: ReloadMode,
}

/// Host callback through which the engine obtains plugin configs.
///
/// Implementations are shared across concurrent transformation requests and
/// must be internally thread-safe.
pub trait ConfigSource: Send + Sync {
    /// Loads (or rehydrates) the config for the given request.
    fn load_config(&self, request: &ConfigRequest) -> Result<PluginConfig, ConfigLoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_defaults() {
        let config = PluginConfig::empty("strata-transformer-json");
        assert_eq!(config.package_name, "strata-transformer-json");
        assert!(config.result_hash.is_empty());
        assert!(config.dev_deps.is_empty());
        assert_eq!(config.reload_mode, ReloadMode::Rehydrate);
        assert!(config.data.is_null());
    }

    #[test]
    fn dev_deps_are_canonically_ordered() {
        let mut config = PluginConfig::empty("p");
        config
            .dev_deps
            .insert(("zeta".to_string(), "2.0.0".to_string()));
        config
            .dev_deps
            .insert(("alpha".to_string(), "1.0.0".to_string()));

        let names: Vec<_> = config.dev_deps.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn serde_roundtrip() {
        let mut config = PluginConfig::empty("p");
        config.result_hash = "abc123".to_string();
        config.reload_mode = ReloadMode::Reload;
        config.data = serde_json::json!({"presets": ["env"]});

        let json = serde_json::to_string(&config).unwrap();
        let back: PluginConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.result_hash, "abc123");
        assert_eq!(back.reload_mode, ReloadMode::Reload);
        assert_eq!(back.data["presets"][0], "env");
    }
}
