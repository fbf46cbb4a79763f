//! Packaged module discovery.
//!
//! A plugin directory holds packaged modules: regular files carrying the
//! package extension (`hpk` by default). Anything else in the directory is
//! ignored. When no directory is configured the per-user data directory is
//! used:
//!
//! - Linux: `$XDG_DATA_HOME/hatch/plugins/`
//! - macOS: `~/Library/Application Support/dev.hatch.hatch/plugins/`
//! - Windows: `{FOLDERID_RoamingAppData}\hatch\hatch\data\plugins\`

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default extension of packaged modules.
pub const DEFAULT_PACKAGE_EXTENSION: &str = "hpk";

/// Get the user plugins directory.
pub fn default_plugins_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "hatch", "hatch")
        .map(|dirs| dirs.data_dir().join("plugins"))
}

/// Check whether `path` names a packaged module with the given extension.
///
/// Only the file name is inspected; see [`list_packages`] for the regular
/// file check.
pub fn is_package(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// List the packaged modules directly inside `dir`, sorted by path.
///
/// A missing directory yields an empty list. An unreadable directory is
/// logged and also yields an empty list.
pub fn list_packages(dir: &Path, extension: &str) -> Vec<PathBuf> {
    if !dir.exists() {
        debug!("Plugin directory {:?} does not exist", dir);
        return Vec::new();
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("Failed to read plugin directory {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut packages = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();

        if !is_package(&path, extension) {
            debug!("Skipping {:?}: not a .{} package", path, extension);
            continue;
        }

        if !path.is_file() {
            debug!("Skipping {:?}: not a regular file", path);
            continue;
        }

        packages.push(path);
    }

    packages.sort();
    packages
}

/// File name of a package, used as its key in batch results.
///
/// Bytes that are not valid UTF-8 are escaped (`\xFF`) rather than replaced,
/// so two distinct file names never map to the same key.
pub fn package_key(path: &Path) -> String {
    match path.file_name() {
        Some(name) => match name.to_str() {
            Some(name) => name.to_string(),
            None => format!("{:?}", name).trim_matches('"').to_string(),
        },
        None => path.display().to_string(),
    }
}
