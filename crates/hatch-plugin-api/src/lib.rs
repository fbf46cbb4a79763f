//! # hatch-plugin-api
//!
//! The contract shared between a hatch host and the plugins it loads.
//!
//! This crate provides:
//! - The [`Contract`] trait a host implements to name the capability every
//!   plugin entry point must satisfy
//! - [`EntryPointDecl`], the static a plugin exports once per entry point
//! - The [`export_entry_point!`] macro that emits those statics
//!
//! ## Plugin Development
//!
//! A plugin crate is built as a `cdylib`, packaged together with a
//! `plugin.json` naming its entry point, and exports one declaration per
//! entry point:
//!
//! ```ignore
//! use hatch_plugin_api::export_entry_point;
//!
//! #[derive(Default)]
//! pub struct EnglishGreeter;
//!
//! impl Greeter for EnglishGreeter { /* ... */ }
//!
//! // Resolvable as `greeter.English` from plugin.json
//! export_entry_point!(greeter_English, GreeterContract, EnglishGreeter);
//! ```

pub mod contract;
pub mod decl;

pub use contract::Contract;
pub use decl::{panic_message, symbol_name, Constructor, EntryPointDecl};

/// Version of the declaration layout shared by hosts and plugins.
///
/// A host refuses any entry point whose declaration was built against a
/// different version.
pub const ABI_VERSION: u32 = 2;
