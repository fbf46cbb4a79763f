//! The module loader.
//!
//! [`PluginLoader`] turns a packaged module into a [`LoadedPlugin`]:
//!
//! 1. open an isolated [`LoadingContext`] for the package
//! 2. read the configuration resource
//! 3. decode it into a configuration record
//! 4. resolve the record's entry point in the context
//! 5. check the entry point against the host's [`Contract`]
//! 6. call the entry point's constructor
//!
//! Every step reports failure as a [`LoadError`]; decoder errors and
//! constructor panics are caught and wrapped. When a step after (1) fails
//! the context is closed before the error is returned.

use crate::config::LoaderConfig;
use crate::context::{HostContext, LoadingContext};
use crate::error::{LoadError, LoadResult};
use crate::handle::LoadedPlugin;
use crate::manifest::{ConfigDecoder, JsonDecoder, PluginConfig, PluginManifest};
use hatch_plugin_api::{panic_message, Contract, EntryPointDecl, ABI_VERSION};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loads packaged modules whose entry points satisfy the contract `C`.
pub struct PluginLoader<C: Contract> {
    config: LoaderConfig,
    parent: Option<Arc<HostContext>>,
    live_contexts: Arc<AtomicUsize>,
    reclaim_passes: AtomicUsize,
    _contract: PhantomData<fn() -> C>,
}

impl<C: Contract> PluginLoader<C> {
    /// Create a loader, creating the plugin directory if it does not exist.
    pub fn new(config: LoaderConfig) -> LoadResult<Self> {
        config.validate()?;

        if !config.plugins_dir.exists() {
            std::fs::create_dir_all(&config.plugins_dir)?;
            info!("Created plugin directory {:?}", config.plugins_dir);
        }

        Ok(Self {
            config,
            parent: None,
            live_contexts: Arc::new(AtomicUsize::new(0)),
            reclaim_passes: AtomicUsize::new(0),
            _contract: PhantomData,
        })
    }

    /// Chain every loading context to a host context.
    pub fn with_parent(mut self, host: HostContext) -> Self {
        self.parent = Some(Arc::new(host));
        self
    }

    /// Get the loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Get the plugin directory.
    pub fn plugins_dir(&self) -> &Path {
        &self.config.plugins_dir
    }

    /// Get the host context, if any.
    pub fn parent(&self) -> Option<&HostContext> {
        self.parent.as_deref()
    }

    /// Number of loading contexts created by this loader that are still open.
    pub fn live_contexts(&self) -> usize {
        self.live_contexts.load(Ordering::SeqCst)
    }

    /// Number of reclamation passes this loader has run.
    pub fn reclaim_passes(&self) -> usize {
        self.reclaim_passes.load(Ordering::SeqCst)
    }

    /// Load a package with the configured resource name and the JSON decoder.
    pub fn load(&self, package: impl AsRef<Path>) -> LoadResult<LoadedPlugin<C>> {
        self.load_with::<PluginManifest, _>(package, &self.config.config_resource, &JsonDecoder)
    }

    /// Load a package, decoding `resource` with `decoder` into `R`.
    pub fn load_with<R, D>(
        &self,
        package: impl AsRef<Path>,
        resource: &str,
        decoder: &D,
    ) -> LoadResult<LoadedPlugin<C, R>>
    where
        R: PluginConfig,
        D: ConfigDecoder,
    {
        let package = package.as_ref();
        if !package.is_file() {
            return Err(LoadError::NotFound {
                path: package.to_path_buf(),
            });
        }

        debug!("Loading {:?} against contract {}", package, C::NAME);
        let mut context =
            LoadingContext::open(package, self.parent.clone(), Arc::clone(&self.live_contexts))?;

        match Self::bind::<R, D>(&mut context, resource, decoder) {
            Ok((instance, config, type_name)) => {
                info!(
                    "Loaded plugin {} ({}) from {:?}",
                    config.entry_point_name(),
                    type_name,
                    package
                );
                Ok(LoadedPlugin::new(instance, config, type_name, context))
            }
            Err(e) => {
                if let Err(close_err) = context.close() {
                    warn!(
                        "Failed to close loading context for {:?}: {}",
                        package, close_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Run steps 2-6 inside an open context.
    fn bind<R, D>(
        context: &mut LoadingContext,
        resource: &str,
        decoder: &D,
    ) -> LoadResult<(Box<C::Object>, R, String)>
    where
        R: PluginConfig,
        D: ConfigDecoder,
    {
        let bytes = context.read_resource(resource)?;

        let config: R = decoder
            .decode(&bytes)
            .map_err(|e| LoadError::ConfigDecodeError {
                package: context.package().to_path_buf(),
                message: format!("cannot decode '{}'", resource),
                source: Some(e),
            })?;

        config
            .validate()
            .map_err(|message| LoadError::ConfigDecodeError {
                package: context.package().to_path_buf(),
                message,
                source: None,
            })?;

        let entry_point = config.entry_point_name().to_string();
        let decl = context.resolve(&entry_point, config.library())?;

        check_contract::<C>(decl, &entry_point)?;
        let instance = instantiate::<C>(decl, &entry_point)?;
        let type_name = decl.type_name.to_string();

        Ok((instance, config, type_name))
    }

    /// Release a plugin.
    ///
    /// The capability object is dropped first, then the loading context is
    /// closed. With `reclaim` set, a reclamation pass follows; it is advisory
    /// and its result is ignored.
    pub fn unload<R: PluginConfig>(&self, handle: LoadedPlugin<C, R>, reclaim: bool) -> LoadResult<()> {
        let (instance, config, type_name, context) = handle.into_parts();
        let entry_point = config.entry_point_name().to_string();

        drop(instance);
        let closed = context.close();

        if reclaim {
            self.reclaim();
        }

        match closed {
            Ok(()) => {
                info!("Unloaded plugin {} ({})", entry_point, type_name);
                Ok(())
            }
            Err(e) => Err(LoadError::ReleaseFailed {
                message: format!("cannot tear down loading context of '{}'", entry_point),
                type_name,
                source: Some(e),
            }),
        }
    }

    /// Release a plugin, reclaiming if the configuration asks for it.
    pub fn release<R: PluginConfig>(&self, handle: LoadedPlugin<C, R>) -> LoadResult<()> {
        self.unload(handle, self.config.reclaim_on_unload)
    }

    /// Run one reclamation pass.
    pub fn reclaim(&self) {
        self.reclaim_passes.fetch_add(1, Ordering::SeqCst);
        let released = crate::reclaim::reclaim();
        debug!("Reclamation pass finished (released: {})", released);
    }
}

impl<C: Contract> std::fmt::Debug for PluginLoader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("contract", &C::NAME)
            .field("config", &self.config)
            .field("parent", &self.parent)
            .field("live_contexts", &self.live_contexts())
            .finish()
    }
}

/// Check a declaration against the host contract before anything is constructed.
fn check_contract<C: Contract>(decl: &EntryPointDecl, entry_point: &str) -> LoadResult<()> {
    if decl.satisfies::<C>() {
        return Ok(());
    }

    let message = if decl.abi_version != ABI_VERSION {
        format!(
            "built against ABI version {}, host uses {}",
            decl.abi_version, ABI_VERSION
        )
    } else {
        format!("{} implements '{}'", decl.type_name, decl.contract)
    };

    Err(LoadError::CapabilityMismatch {
        entry_point: entry_point.to_string(),
        contract: C::NAME.to_string(),
        message,
    })
}

/// Call a declaration's constructor and recover the contract object.
///
/// Panics raised in a plugin library are caught there and arrive as `Err`;
/// the `catch_unwind` here covers constructors linked into the host.
fn instantiate<C: Contract>(decl: &EntryPointDecl, entry_point: &str) -> LoadResult<Box<C::Object>> {
    let constructor = decl.constructor.ok_or_else(|| LoadError::InstantiationFailed {
        entry_point: entry_point.to_string(),
        message: format!("{} has no constructor", decl.type_name),
        source: None,
    })?;

    let erased = panic::catch_unwind(AssertUnwindSafe(constructor))
        .map_err(|payload| panic_message(payload.as_ref()))
        .and_then(|constructed| constructed)
        .map_err(|message| LoadError::InstantiationFailed {
            entry_point: entry_point.to_string(),
            message: format!("constructor panicked: {}", message),
            source: None,
        })?;

    match erased.downcast::<Box<C::Object>>() {
        Ok(object) => Ok(*object),
        Err(_) => Err(LoadError::CapabilityMismatch {
            entry_point: entry_point.to_string(),
            contract: C::NAME.to_string(),
            message: format!("{} did not construct a {} object", decl.type_name, C::NAME),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use hatch_plugin_api::export_entry_point;
    use std::any::Any;
    use tempfile::TempDir;

    trait Widget: Send + std::fmt::Debug {
        fn id(&self) -> u32;
    }

    struct WidgetContract;

    impl Contract for WidgetContract {
        type Object = dyn Widget;
        const NAME: &'static str = "tests.Widget";
    }

    #[derive(Debug)]
    struct Gear;

    impl Widget for Gear {
        fn id(&self) -> u32 {
            42
        }
    }

    export_entry_point!(loader_tests_Gear, WidgetContract, Gear);

    #[test]
    fn test_new_creates_plugin_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("plugins");

        let loader = PluginLoader::<WidgetContract>::new(LoaderConfig::new(&dir)).unwrap();
        assert!(dir.is_dir());
        assert_eq!(loader.plugins_dir(), dir.as_path());
        assert_eq!(loader.live_contexts(), 0);
        assert_eq!(loader.reclaim_passes(), 0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoaderConfig::new(temp_dir.path()).with_config_resource("");
        let err = PluginLoader::<WidgetContract>::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_load_missing_package() {
        let temp_dir = TempDir::new().unwrap();
        let loader = PluginLoader::<WidgetContract>::new(LoaderConfig::new(temp_dir.path())).unwrap();

        let err = loader.load(temp_dir.path().join("absent.hpk")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // A directory is not a packaged module either
        let err = loader.load(temp_dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_check_contract() {
        assert!(check_contract::<WidgetContract>(&loader_tests_Gear, "tests.Gear").is_ok());

        let foreign = EntryPointDecl {
            contract: "tests.Other",
            ..loader_tests_Gear
        };
        let err = check_contract::<WidgetContract>(&foreign, "tests.Gear").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityMismatch);
        assert!(err.to_string().contains("implements 'tests.Other'"));

        let outdated = EntryPointDecl {
            abi_version: ABI_VERSION + 1,
            ..loader_tests_Gear
        };
        let err = check_contract::<WidgetContract>(&outdated, "tests.Gear").unwrap_err();
        assert!(err.to_string().contains("ABI version"));
    }

    #[test]
    fn test_instantiate() {
        let widget = instantiate::<WidgetContract>(&loader_tests_Gear, "tests.Gear").unwrap();
        assert_eq!(widget.id(), 42);
    }

    #[test]
    fn test_instantiate_without_constructor() {
        let abstract_decl = EntryPointDecl {
            constructor: None,
            ..loader_tests_Gear
        };
        let err = instantiate::<WidgetContract>(&abstract_decl, "tests.Gear").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InstantiationFailed);
    }

    #[test]
    fn test_instantiate_wrong_object_type() {
        fn construct_string() -> Result<Box<dyn Any + Send>, String> {
            Ok(Box::new(String::from("not a widget")))
        }

        let lying = EntryPointDecl {
            constructor: Some(construct_string),
            ..loader_tests_Gear
        };
        let err = instantiate::<WidgetContract>(&lying, "tests.Gear").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityMismatch);
    }

    #[test]
    fn test_instantiate_reports_plugin_side_panic() {
        fn refuse() -> Result<Box<dyn Any + Send>, String> {
            Err("out of gears".to_string())
        }

        let refusing = EntryPointDecl {
            constructor: Some(refuse),
            ..loader_tests_Gear
        };
        let err = instantiate::<WidgetContract>(&refusing, "tests.Gear").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InstantiationFailed);
        assert!(err.to_string().contains("out of gears"));
    }
}
