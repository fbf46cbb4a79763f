//! Loader configuration.
//!
//! Loader settings can be built in code or read from a TOML file:
//!
//! ```toml
//! # Directory scanned for packaged modules (created if absent)
//! plugins_dir = "/var/lib/myhost/plugins"
//!
//! # Extension of packaged modules
//! package_extension = "hpk"
//!
//! # Configuration resource looked up inside every package
//! config_resource = "plugin.json"
//!
//! # Run a reclamation pass after each unload
//! reclaim_on_unload = true
//! ```
//!
//! Every key is optional.

use crate::discovery::{default_plugins_dir, DEFAULT_PACKAGE_EXTENSION};
use crate::error::{LoadError, LoadResult};
use crate::manifest::DEFAULT_CONFIG_RESOURCE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of a [`PluginLoader`](crate::PluginLoader).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory scanned by batch loads.
    /// Default: the user plugins directory, or `./plugins`
    pub plugins_dir: PathBuf,

    /// Extension of packaged modules, without the dot.
    /// Default: "hpk"
    pub package_extension: String,

    /// Name of the configuration resource inside each package.
    /// Default: "plugin.json"
    pub config_resource: String,

    /// Whether [`PluginLoader::release`](crate::PluginLoader::release) runs a
    /// reclamation pass.
    /// Default: true
    pub reclaim_on_unload: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir().unwrap_or_else(|| PathBuf::from("plugins")),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            config_resource: DEFAULT_CONFIG_RESOURCE.to_string(),
            reclaim_on_unload: true,
        }
    }
}

impl LoaderConfig {
    /// Create a configuration for the given plugin directory.
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            ..Self::default()
        }
    }

    /// Set the package extension.
    pub fn with_package_extension(mut self, extension: impl Into<String>) -> Self {
        self.package_extension = extension.into();
        self
    }

    /// Set the configuration resource name.
    pub fn with_config_resource(mut self, resource: impl Into<String>) -> Self {
        self.config_resource = resource.into();
        self
    }

    /// Enable or disable the reclamation pass after unload.
    pub fn with_reclaim_on_unload(mut self, reclaim: bool) -> Self {
        self.reclaim_on_unload = reclaim;
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> LoadResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> LoadResult<Self> {
        let config: LoaderConfig = toml::from_str(content)
            .map_err(|e| LoadError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LoadResult<()> {
        let extension = self.package_extension.trim();
        if extension.is_empty() {
            return Err(LoadError::InvalidConfig(
                "package_extension cannot be empty".to_string(),
            ));
        }

        if extension.starts_with('.') {
            return Err(LoadError::InvalidConfig(format!(
                "package_extension must not start with a dot: {}",
                extension
            )));
        }

        if self.config_resource.trim().is_empty() {
            return Err(LoadError::InvalidConfig(
                "config_resource cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
