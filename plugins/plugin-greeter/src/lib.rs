//! # plugin-greeter
//!
//! A sample plugin for testing and development.
//!
//! It defines a small `Greeter` capability contract and exports two entry
//! points implementing it. Built as a `cdylib` it can be packaged next to a
//! `plugin.json` such as:
//!
//! ```json
//! { "entryPointName": "greeter.English", "name": "greeter", "version": "0.1.0" }
//! ```
//!
//! Built as an `rlib`, hosts and tests can expose the same declarations
//! through a host context without going through a native library.

use hatch_plugin_api::{export_entry_point, Contract};

/// Entry point name of [`EnglishGreeter`].
pub const ENGLISH_ENTRY_POINT: &str = "greeter.English";

/// Entry point name of [`PirateGreeter`].
pub const PIRATE_ENTRY_POINT: &str = "greeter.Pirate";

/// The capability sample hosts require from greeter plugins.
pub trait Greeter: Send {
    /// Greet someone by name.
    fn greet(&self, name: &str) -> String;

    /// Language tag of the greeting.
    fn language(&self) -> &str;
}

/// Contract marker for [`Greeter`].
pub struct GreeterContract;

impl Contract for GreeterContract {
    type Object = dyn Greeter;
    const NAME: &'static str = "hatch.sample.Greeter";
}

/// Plain English greetings.
#[derive(Debug, Default)]
pub struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {}!", name)
    }

    fn language(&self) -> &str {
        "en"
    }
}

/// Greetings for the high seas.
#[derive(Debug)]
pub struct PirateGreeter {
    salute: &'static str,
}

impl PirateGreeter {
    /// Create a new pirate greeter.
    pub fn new() -> Self {
        Self { salute: "Ahoy" }
    }
}

impl Default for PirateGreeter {
    fn default() -> Self {
        Self::new()
    }
}

impl Greeter for PirateGreeter {
    fn greet(&self, name: &str) -> String {
        format!("{}, {}!", self.salute, name)
    }

    fn language(&self) -> &str {
        "en-pirate"
    }
}

export_entry_point!(greeter_English, GreeterContract, EnglishGreeter);
export_entry_point!(greeter_Pirate, GreeterContract, PirateGreeter::new());
