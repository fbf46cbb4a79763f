//! Error types for the hatch runtime.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause raised by a host collaborator (decoder, library loader, I/O).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while loading or releasing a plugin.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Packaged module missing or not a regular file.
    #[error("Packaged module not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The configuration resource is not present in the package.
    #[error("Configuration resource '{resource}' missing from {}", .package.display())]
    ConfigMissing { package: PathBuf, resource: String },

    /// The package or its configuration resource could not be read.
    #[error("Failed to read configuration from {}: {message}", .package.display())]
    ConfigReadError {
        package: PathBuf,
        message: String,
        #[source]
        source: BoxError,
    },

    /// The configuration bytes could not be decoded into a record.
    #[error("Failed to decode configuration from {}: {message}", .package.display())]
    ConfigDecodeError {
        package: PathBuf,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The entry point could not be resolved in the loading context.
    #[error("Entry point '{entry_point}' not found: {message}")]
    EntryPointNotFound {
        entry_point: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The entry point does not implement the required capability contract.
    #[error("Entry point '{entry_point}' does not satisfy contract '{contract}': {message}")]
    CapabilityMismatch {
        entry_point: String,
        contract: String,
        message: String,
    },

    /// The entry point could not be constructed.
    #[error("Failed to instantiate '{entry_point}': {message}")]
    InstantiationFailed {
        entry_point: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The loading context could not be torn down.
    #[error("Failed to release plugin {type_name}: {message}")]
    ReleaseFailed {
        type_name: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Loader settings are invalid.
    #[error("Invalid loader configuration: {0}")]
    InvalidConfig(String),

    /// IO error outside of a single plugin load (e.g. creating the plugin directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome kind of a [`LoadError`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    NotFound,
    ConfigMissing,
    ConfigReadError,
    ConfigDecodeError,
    EntryPointNotFound,
    CapabilityMismatch,
    InstantiationFailed,
    ReleaseFailed,
    InvalidConfig,
    Io,
}

impl LoadError {
    /// Get the outcome kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::NotFound { .. } => ErrorKind::NotFound,
            LoadError::ConfigMissing { .. } => ErrorKind::ConfigMissing,
            LoadError::ConfigReadError { .. } => ErrorKind::ConfigReadError,
            LoadError::ConfigDecodeError { .. } => ErrorKind::ConfigDecodeError,
            LoadError::EntryPointNotFound { .. } => ErrorKind::EntryPointNotFound,
            LoadError::CapabilityMismatch { .. } => ErrorKind::CapabilityMismatch,
            LoadError::InstantiationFailed { .. } => ErrorKind::InstantiationFailed,
            LoadError::ReleaseFailed { .. } => ErrorKind::ReleaseFailed,
            LoadError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            LoadError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for runtime operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;
