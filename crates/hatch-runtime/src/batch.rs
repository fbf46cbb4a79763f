//! Batch operations over plugin directories and handle collections.
//!
//! A failure of one item never stops the batch: every item gets its own
//! outcome in the returned map.

use crate::discovery::{list_packages, package_key};
use crate::error::{ErrorKind, LoadResult};
use crate::handle::LoadedPlugin;
use crate::loader::PluginLoader;
use crate::manifest::{ConfigDecoder, JsonDecoder, PluginConfig, PluginManifest};
use hatch_plugin_api::Contract;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};

impl<C: Contract> PluginLoader<C> {
    /// Load every packaged module in `dir`, keyed by file name.
    ///
    /// Only regular files with the configured package extension are
    /// considered. A missing directory yields an empty map.
    pub fn load_all<R, D>(
        &self,
        dir: impl AsRef<Path>,
        resource: &str,
        decoder: &D,
    ) -> BTreeMap<String, LoadResult<LoadedPlugin<C, R>>>
    where
        R: PluginConfig,
        D: ConfigDecoder,
    {
        let dir = dir.as_ref();
        let mut outcomes = BTreeMap::new();

        for package in list_packages(dir, &self.config().package_extension) {
            let outcome = self.load_with::<R, D>(&package, resource, decoder);
            if let Err(e) = &outcome {
                warn!("Failed to load plugin {:?}: {}", package, e);
            }
            let key = package_key(&package);
            if let Some(replaced) = outcomes.insert(key.clone(), outcome) {
                warn!(
                    "Package key {} is shared by several files; earlier outcome replaced (ok: {})",
                    key,
                    replaced.is_ok()
                );
            }
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        info!(
            "Loaded {} of {} plugins from {:?}",
            summary.succeeded,
            summary.total(),
            dir
        );
        outcomes
    }

    /// Load every package in the plugin directory with the configured
    /// resource name and the JSON decoder.
    pub fn load_all_default(&self) -> BTreeMap<String, LoadResult<LoadedPlugin<C>>> {
        self.load_all::<PluginManifest, _>(
            self.plugins_dir(),
            &self.config().config_resource,
            &JsonDecoder,
        )
    }

    /// Unload every handle, keyed by entry point name.
    ///
    /// Handles are unloaded without individual reclamation; when `reclaim`
    /// is set a single pass runs at the end. Two handles sharing an entry
    /// point name share a key: both are released, but only the later
    /// outcome is kept in the map.
    pub fn unload_all<R, I>(&self, handles: I, reclaim: bool) -> HashMap<String, LoadResult<()>>
    where
        R: PluginConfig,
        I: IntoIterator<Item = LoadedPlugin<C, R>>,
    {
        let mut outcomes = HashMap::new();
        let mut released = 0usize;

        for handle in handles {
            let key = handle.entry_point_name().to_string();
            let outcome = self.unload(handle, false);
            if let Err(e) = &outcome {
                warn!("Failed to unload plugin {}: {}", key, e);
            }
            if outcomes.insert(key.clone(), outcome).is_some() {
                warn!(
                    "Entry point {} was unloaded more than once; earlier outcome replaced",
                    key
                );
            }
            released += 1;
        }

        if reclaim && released > 0 {
            self.reclaim();
        }

        info!("Unloaded {} plugins", released);
        outcomes
    }
}

/// Success and failure counts of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of successful items.
    pub succeeded: usize,

    /// Failed keys with their outcome kind, sorted by key.
    pub failed: Vec<(String, ErrorKind)>,
}

impl BatchSummary {
    /// Summarize a batch outcome map.
    pub fn from_outcomes<'a, T, I>(outcomes: I) -> Self
    where
        T: 'a,
        I: IntoIterator<Item = (&'a String, &'a LoadResult<T>)>,
    {
        let mut summary = Self::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(_) => summary.succeeded += 1,
                Err(e) => summary.failed.push((key.clone(), e.kind())),
            }
        }
        summary.failed.sort();
        summary
    }

    /// Total number of items.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// Check whether every item succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use std::path::PathBuf;

    #[test]
    fn test_summary_counts() {
        let mut outcomes: BTreeMap<String, LoadResult<()>> = BTreeMap::new();
        outcomes.insert("a.hpk".to_string(), Ok(()));
        outcomes.insert(
            "c.hpk".to_string(),
            Err(LoadError::NotFound {
                path: PathBuf::from("c.hpk"),
            }),
        );
        outcomes.insert(
            "b.hpk".to_string(),
            Err(LoadError::ConfigMissing {
                package: PathBuf::from("b.hpk"),
                resource: "plugin.json".to_string(),
            }),
        );

        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.total(), 3);
        assert!(!summary.is_success());
        assert_eq!(
            summary.failed,
            vec![
                ("b.hpk".to_string(), ErrorKind::ConfigMissing),
                ("c.hpk".to_string(), ErrorKind::NotFound),
            ]
        );
    }

    #[test]
    fn test_empty_summary() {
        let outcomes: HashMap<String, LoadResult<()>> = HashMap::new();
        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(summary.total(), 0);
        assert!(summary.is_success());
    }
}
