//! Error type for config loading.

/// The host config loader or rehydrator failed.
///
/// Fatal to the transformation request that needed the config.
#[derive(Debug, thiserror::Error)]
#[error("failed to load config for {package}: {reason}")]
pub struct ConfigLoadError {
    /// The plugin package whose config failed to load.
    pub package: String,

    /// Description of the failure from the host loader.
    pub reason: String,
}

impl ConfigLoadError {
    /// Creates a load error for the given package.
    pub fn new(package: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            reason: reason.into(),
        }
    }
}
