//! Plugin registry for managing loaded plugins.
//!
//! The registry owns a [`PluginLoader`] and the handles it produced, keyed
//! by package file name, so two packages sharing an entry point name stay
//! distinct.

use crate::discovery::{list_packages, package_key};
use crate::error::{LoadError, LoadResult};
use crate::handle::LoadedPlugin;
use crate::loader::PluginLoader;
use crate::manifest::{ConfigDecoder, PluginConfig, PluginManifest};
use chrono::{DateTime, Utc};
use hatch_plugin_api::Contract;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Registry of loaded plugins.
pub struct PluginRegistry<C: Contract, R: PluginConfig = PluginManifest> {
    /// Loader used for every load and unload.
    loader: PluginLoader<C>,

    /// Loaded plugins by package file name.
    plugins: BTreeMap<String, LoadedPlugin<C, R>>,
}

impl<C: Contract, R: PluginConfig> PluginRegistry<C, R> {
    /// Create an empty registry around a loader.
    pub fn new(loader: PluginLoader<C>) -> Self {
        Self {
            loader,
            plugins: BTreeMap::new(),
        }
    }

    /// Get the underlying loader.
    pub fn loader(&self) -> &PluginLoader<C> {
        &self.loader
    }

    /// Load every package in the loader's plugin directory that is not
    /// registered yet.
    ///
    /// Successfully loaded plugins are registered; failures are returned by
    /// file name.
    pub fn load_dir<D: ConfigDecoder>(&mut self, decoder: &D) -> BTreeMap<String, LoadError> {
        let config = self.loader.config();
        let packages = list_packages(&config.plugins_dir, &config.package_extension);
        let resource = config.config_resource.clone();

        let mut failures = BTreeMap::new();
        let mut loaded = 0;

        for package in packages {
            let name = package_key(&package);
            if self.plugins.contains_key(&name) {
                debug!("Skipping {}: already loaded", name);
                continue;
            }

            match self.loader.load_with::<R, D>(&package, &resource, decoder) {
                Ok(plugin) => {
                    self.plugins.insert(name, plugin);
                    loaded += 1;
                }
                Err(e) => {
                    warn!("Failed to load plugin {:?}: {}", package, e);
                    failures.insert(name, e);
                }
            }
        }

        info!("Loaded {} plugins", loaded);
        failures
    }

    /// Get a plugin by package file name.
    pub fn get(&self, name: &str) -> Option<&LoadedPlugin<C, R>> {
        self.plugins.get(name)
    }

    /// Get a plugin mutably by package file name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut LoadedPlugin<C, R>> {
        self.plugins.get_mut(name)
    }

    /// Iterate over loaded plugins in file name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LoadedPlugin<C, R>)> {
        self.plugins.iter().map(|(name, plugin)| (name.as_str(), plugin))
    }

    /// Get all loaded package file names.
    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Get the number of loaded plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if no plugin is loaded.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// List plugin information.
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|(name, plugin)| PluginInfo {
                file_name: name.clone(),
                entry_point: plugin.entry_point_name().to_string(),
                type_name: plugin.type_name().to_string(),
                loaded_at: plugin.loaded_at(),
            })
            .collect()
    }

    /// Unload a plugin by package file name.
    pub fn unload(&mut self, name: &str) -> LoadResult<()> {
        match self.plugins.remove(name) {
            Some(plugin) => {
                let reclaim = self.loader.config().reclaim_on_unload;
                self.loader.unload(plugin, reclaim)
            }
            None => Err(LoadError::NotFound {
                path: self.loader.plugins_dir().join(name),
            }),
        }
    }

    /// Unload every plugin, keyed by package file name.
    ///
    /// At most one reclamation pass runs, after the last plugin.
    pub fn unload_all(&mut self) -> HashMap<String, LoadResult<()>> {
        let plugins = std::mem::take(&mut self.plugins);
        let count = plugins.len();

        let outcomes: HashMap<String, LoadResult<()>> = plugins
            .into_iter()
            .map(|(name, plugin)| {
                let outcome = self.loader.unload(plugin, false);
                if let Err(e) = &outcome {
                    warn!("Failed to unload plugin {}: {}", name, e);
                }
                (name, outcome)
            })
            .collect();

        if count > 0 && self.loader.config().reclaim_on_unload {
            self.loader.reclaim();
        }

        info!("Unloaded {} plugins", count);
        outcomes
    }
}

/// Information about a loaded plugin.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub file_name: String,
    pub entry_point: String,
    pub type_name: String,
    pub loaded_at: DateTime<Utc>,
}
