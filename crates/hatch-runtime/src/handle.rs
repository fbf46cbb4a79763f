//! Loaded module handles.

use crate::context::LoadingContext;
use crate::manifest::{PluginConfig, PluginManifest};
use chrono::{DateTime, Utc};
use hatch_plugin_api::Contract;
use std::path::{Path, PathBuf};

/// A successfully loaded plugin.
///
/// The handle owns the instantiated capability object, the configuration
/// record it was loaded from, and the isolated loading context the object's
/// code lives in. Hand it back to
/// [`PluginLoader::unload`](crate::PluginLoader::unload) to release it; since
/// `unload` takes the handle by value, neither a second unload nor a call
/// through a released object compiles. Dropping a handle without unloading
/// releases it as well, without reporting errors.
pub struct LoadedPlugin<C: Contract, R = PluginManifest> {
    // Declared before `context`: the object's code must stay mapped until
    // the object itself is gone.
    instance: Box<C::Object>,
    config: R,
    package: PathBuf,
    type_name: String,
    loaded_at: DateTime<Utc>,
    context: LoadingContext,
}

impl<C: Contract, R: PluginConfig> LoadedPlugin<C, R> {
    pub(crate) fn new(
        instance: Box<C::Object>,
        config: R,
        type_name: String,
        context: LoadingContext,
    ) -> Self {
        Self {
            instance,
            config,
            package: context.package().to_path_buf(),
            type_name,
            loaded_at: Utc::now(),
            context,
        }
    }

    /// Get the capability object.
    pub fn capability(&self) -> &C::Object {
        &self.instance
    }

    /// Get the capability object mutably.
    pub fn capability_mut(&mut self) -> &mut C::Object {
        &mut self.instance
    }

    /// Get the configuration record.
    pub fn config(&self) -> &R {
        &self.config
    }

    /// Get the configured entry point name.
    pub fn entry_point_name(&self) -> &str {
        self.config.entry_point_name()
    }

    /// Get the name of the instantiated type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get the path of the packaged module.
    pub fn package(&self) -> &Path {
        &self.package
    }

    /// Get the file name of the packaged module.
    pub fn file_name(&self) -> String {
        crate::discovery::package_key(&self.package)
    }

    /// Get when the plugin was loaded.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Get the loading context.
    pub fn context(&self) -> &LoadingContext {
        &self.context
    }

    /// Split the handle for release.
    pub(crate) fn into_parts(self) -> (Box<C::Object>, R, String, LoadingContext) {
        (self.instance, self.config, self.type_name, self.context)
    }
}

impl<C: Contract, R: std::fmt::Debug> std::fmt::Debug for LoadedPlugin<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("contract", &C::NAME)
            .field("type_name", &self.type_name)
            .field("package", &self.package)
            .field("config", &self.config)
            .field("loaded_at", &self.loaded_at)
            .field("context", &self.context)
            .finish()
    }
}
