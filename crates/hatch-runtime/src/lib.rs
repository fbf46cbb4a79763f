//! # hatch-runtime
//!
//! Lifecycle manager for packaged plugins.
//!
//! This crate provides:
//! - Discovery of packaged modules in a plugin directory
//! - One isolated loading context per module
//! - Configuration record decoding (JSON or TOML)
//! - Contract-checked instantiation of the module's entry point
//! - Deterministic unloading, singly or in batches
//!
//! ## Package Structure
//!
//! A packaged module is a zip archive (`.hpk` by default) containing:
//! - `plugin.json` - configuration record naming the entry point
//! - zero or more native libraries (`.so`, `.dylib` or `.dll`) exporting
//!   entry point declarations
//!
//! Entry points may also be exposed by the host through a [`HostContext`],
//! which every loading context consults first.
//!
//! ## Outcomes
//!
//! No operation panics on a faulty plugin: every failure is a [`LoadError`]
//! whose [`kind`](LoadError::kind) tells which step failed and whose source
//! chain carries the original cause.
//!
//! ```ignore
//! let loader = PluginLoader::<GreeterContract>::new(LoaderConfig::new("plugins"))?;
//! for (file, outcome) in loader.load_all_default() {
//!     match outcome {
//!         Ok(plugin) => println!("{}: {}", file, plugin.capability().greet("world")),
//!         Err(e) => eprintln!("{}: {}", file, e),
//!     }
//! }
//! ```

pub mod batch;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod handle;
pub mod loader;
pub mod manifest;
pub mod reclaim;
pub mod registry;

pub use batch::BatchSummary;
pub use config::LoaderConfig;
pub use context::{HostContext, LoadingContext};
pub use discovery::{default_plugins_dir, list_packages};
pub use error::{BoxError, ErrorKind, LoadError, LoadResult};
pub use handle::LoadedPlugin;
pub use loader::PluginLoader;
pub use manifest::{ConfigDecoder, JsonDecoder, PluginConfig, PluginManifest, TomlDecoder};
pub use registry::{PluginInfo, PluginRegistry};

pub use hatch_plugin_api::{export_entry_point, Contract, EntryPointDecl, ABI_VERSION};
