//! Isolated loading contexts.
//!
//! Every packaged module is loaded through its own [`LoadingContext`]. The
//! context owns the open package archive, a private scratch directory the
//! module's native libraries are extracted into, and the library handles
//! opened from those copies. Because every context links its own copies,
//! two modules exporting the same symbol names never see each other's code.
//!
//! A context may be chained to a [`HostContext`]: entry points the host
//! exposes there resolve before the module's own libraries are consulted.

use crate::error::{BoxError, LoadError, LoadResult};
use hatch_plugin_api::{symbol_name, EntryPointDecl};
use libloading::Library;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;
use zip::result::ZipError;
use zip::ZipArchive;

/// Largest configuration resource read from a package, in bytes.
///
/// The size recorded in the archive is not trusted: reads stop at this limit
/// and larger resources fail with `ConfigReadError`.
pub const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

/// Entry points exposed by the host to every loading context.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    entries: HashMap<String, &'static EntryPointDecl>,
}

impl HostContext {
    /// Create an empty host context.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Expose an entry point under `name`, builder style.
    pub fn with_entry(mut self, name: impl Into<String>, decl: &'static EntryPointDecl) -> Self {
        self.expose(name, decl);
        self
    }

    /// Expose an entry point under `name`, replacing any previous one.
    pub fn expose(&mut self, name: impl Into<String>, decl: &'static EntryPointDecl) {
        self.entries.insert(name.into(), decl);
    }

    /// Look up an exposed entry point.
    pub fn lookup(&self, name: &str) -> Option<&'static EntryPointDecl> {
        self.entries.get(name).copied()
    }

    /// Number of exposed entry points.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is exposed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The isolated namespace a single packaged module is loaded through.
pub struct LoadingContext {
    id: Uuid,
    package: PathBuf,
    archive: ZipArchive<File>,
    parent: Option<Arc<HostContext>>,

    // Libraries are declared before the scratch directory so they are
    // closed before their files are removed.
    libraries: Vec<Library>,
    scratch: Option<TempDir>,
    linked: bool,

    live: Arc<AtomicUsize>,
}

impl LoadingContext {
    /// Open a context for `package`.
    ///
    /// `live` counts open contexts; it is incremented here and decremented
    /// when the context is dropped.
    pub(crate) fn open(
        package: &Path,
        parent: Option<Arc<HostContext>>,
        live: Arc<AtomicUsize>,
    ) -> LoadResult<Self> {
        let file = File::open(package).map_err(|e| LoadError::ConfigReadError {
            package: package.to_path_buf(),
            message: "cannot open package".to_string(),
            source: Box::new(e),
        })?;

        let archive = ZipArchive::new(file).map_err(|e| LoadError::ConfigReadError {
            package: package.to_path_buf(),
            message: "not a valid package archive".to_string(),
            source: Box::new(e),
        })?;

        let id = Uuid::new_v4();
        live.fetch_add(1, Ordering::SeqCst);
        debug!("Opened loading context {} for {:?}", id, package);

        Ok(Self {
            id,
            package: package.to_path_buf(),
            archive,
            parent,
            libraries: Vec::new(),
            scratch: None,
            linked: false,
            live,
        })
    }

    /// Unique ID of this context.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path of the package this context was opened for.
    pub fn package(&self) -> &Path {
        &self.package
    }

    /// Number of native libraries linked into this context.
    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }

    /// Scratch directory holding extracted libraries, once one was needed.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|dir| dir.path())
    }

    /// Read a resource from the package.
    ///
    /// Fails with `ConfigMissing` when the package has no such entry and
    /// `ConfigReadError` when the entry cannot be read or is larger than
    /// [`MAX_CONFIG_BYTES`].
    pub(crate) fn read_resource(&mut self, name: &str) -> LoadResult<Vec<u8>> {
        let package = &self.package;
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(LoadError::ConfigMissing {
                    package: package.clone(),
                    resource: name.to_string(),
                })
            }
            Err(e) => {
                return Err(LoadError::ConfigReadError {
                    package: package.clone(),
                    message: format!("cannot open resource '{}'", name),
                    source: Box::new(e),
                })
            }
        };

        let mut bytes = Vec::with_capacity(entry.size().min(MAX_CONFIG_BYTES) as usize);
        entry
            .by_ref()
            .take(MAX_CONFIG_BYTES + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| LoadError::ConfigReadError {
                package: package.clone(),
                message: format!("cannot read resource '{}'", name),
                source: Box::new(e),
            })?;

        if bytes.len() as u64 > MAX_CONFIG_BYTES {
            return Err(LoadError::ConfigReadError {
                package: package.clone(),
                message: format!("resource '{}' exceeds {} bytes", name, MAX_CONFIG_BYTES),
                source: Box::new(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "configuration resource too large",
                )),
            });
        }

        Ok(bytes)
    }

    /// Resolve an entry point declaration.
    ///
    /// The host context is consulted first; otherwise the module's native
    /// libraries are linked (only `library_hint` when given) and searched
    /// for the entry point's symbol.
    pub(crate) fn resolve(
        &mut self,
        entry_point: &str,
        library_hint: Option<&str>,
    ) -> LoadResult<&EntryPointDecl> {
        if let Some(decl) = self
            .parent
            .as_deref()
            .and_then(|host| host.lookup(entry_point))
        {
            debug!("Resolved '{}' from the host context", entry_point);
            return Ok(decl);
        }

        self.link(entry_point, library_hint)?;

        let symbol = symbol_name(entry_point);
        for library in &self.libraries {
            // SAFETY: symbols looked up here are exported by
            // `export_entry_point!`, which always emits a `static EntryPointDecl`.
            // The returned reference is bound to `self`, which keeps the library open.
            let found = unsafe { library.get::<*const EntryPointDecl>(symbol.as_bytes()) };
            if let Ok(address) = found {
                let decl: *const EntryPointDecl = *address;
                if !decl.is_null() {
                    debug!("Resolved '{}' as symbol `{}`", entry_point, symbol);
                    return Ok(unsafe { &*decl });
                }
            }
        }

        Err(LoadError::EntryPointNotFound {
            entry_point: entry_point.to_string(),
            message: format!(
                "symbol `{}` is exported neither by the host nor by {}",
                symbol,
                self.package.display()
            ),
            source: None,
        })
    }

    /// Extract and open the package's native libraries.
    fn link(&mut self, entry_point: &str, library_hint: Option<&str>) -> LoadResult<()> {
        if self.linked {
            return Ok(());
        }

        let not_found = |message: String, source: Option<BoxError>| LoadError::EntryPointNotFound {
            entry_point: entry_point.to_string(),
            message,
            source,
        };

        let names: Vec<String> = match library_hint {
            Some(library) => {
                if !self.archive.file_names().any(|name| name == library) {
                    return Err(not_found(
                        format!("library '{}' is not in the package", library),
                        None,
                    ));
                }
                vec![library.to_string()]
            }
            None => self
                .archive
                .file_names()
                .filter(|name| is_native_library(name))
                .map(String::from)
                .collect(),
        };

        if names.is_empty() {
            self.linked = true;
            return Ok(());
        }

        let scratch = match &self.scratch {
            Some(dir) => dir.path().to_path_buf(),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("hatch-")
                    .tempdir()
                    .map_err(|e| {
                        not_found("cannot create scratch directory".to_string(), Some(Box::new(e)))
                    })?;
                let path = dir.path().to_path_buf();
                self.scratch = Some(dir);
                path
            }
        };

        for name in names {
            let target = self.extract(&name, &scratch).map_err(|e| {
                not_found(format!("cannot extract library '{}'", name), Some(Box::new(e)))
            })?;

            // SAFETY: loading a library runs its initialisers; packages are
            // trusted code supplied by the host's plugin directory.
            let library = unsafe { Library::new(&target) }.map_err(|e| {
                not_found(format!("cannot link library '{}'", name), Some(Box::new(e)))
            })?;

            debug!("Linked {:?} into context {}", target, self.id);
            self.libraries.push(library);
        }

        self.linked = true;
        Ok(())
    }

    /// Extract an archive entry below `scratch`, keeping its archive path so
    /// entries sharing a file name in different directories stay distinct.
    ///
    /// Entries that would escape `scratch` (absolute paths, `..`) are rejected.
    fn extract(&mut self, name: &str, scratch: &Path) -> io::Result<PathBuf> {
        let mut entry = self.archive.by_name(name)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' escapes the scratch directory", name),
            )
        })?;

        let target = scratch.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        Ok(target)
    }

    /// Close the context: unload its libraries and remove the scratch directory.
    ///
    /// Every library is closed even if an earlier one fails; the first error
    /// is returned.
    pub(crate) fn close(mut self) -> Result<(), BoxError> {
        let mut first_error: Option<BoxError> = None;

        for library in self.libraries.drain(..) {
            if let Err(e) = library.close() {
                if first_error.is_none() {
                    first_error = Some(Box::new(e));
                }
            }
        }

        if let Some(scratch) = self.scratch.take() {
            if let Err(e) = scratch.close() {
                if first_error.is_none() {
                    first_error = Some(Box::new(e));
                }
            }
        }

        debug!("Closed loading context {}", self.id);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for LoadingContext {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for LoadingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingContext")
            .field("id", &self.id)
            .field("package", &self.package)
            .field("libraries", &self.libraries.len())
            .field("scratch", &self.scratch_dir())
            .finish()
    }
}

/// Check whether an archive entry is a native library for this platform.
fn is_native_library(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
}
