//! Plugin configuration records.
//!
//! Each packaged module embeds a configuration resource (`plugin.json` by
//! default) naming its entry point. The resource is decoded by a
//! [`ConfigDecoder`] into any record type implementing [`PluginConfig`];
//! [`PluginManifest`] is the record used when the host has no schema of its own.

use crate::error::BoxError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default name of the configuration resource inside a package.
pub const DEFAULT_CONFIG_RESOURCE: &str = "plugin.json";

/// A decoded plugin configuration record.
pub trait PluginConfig: DeserializeOwned {
    /// Fully qualified name of the plugin's entry point.
    fn entry_point_name(&self) -> &str;

    /// Archive path of the native library holding the entry point, if the
    /// record names one. Without a hint every library in the package is linked.
    fn library(&self) -> Option<&str> {
        None
    }

    /// Validate the record after decoding.
    fn validate(&self) -> Result<(), String> {
        if self.entry_point_name().trim().is_empty() {
            return Err("entryPointName cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Default configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Entry point name (`mainClass` is accepted as an alias).
    #[serde(alias = "mainClass")]
    pub entry_point_name: String,

    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Native library inside the package that exports the entry point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    /// Plugin-defined fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PluginManifest {
    /// Create a manifest naming only an entry point.
    pub fn new(entry_point_name: impl Into<String>) -> Self {
        Self {
            entry_point_name: entry_point_name.into(),
            name: None,
            version: None,
            library: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Decode a plugin-defined field into `T`.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extra
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

impl PluginConfig for PluginManifest {
    fn entry_point_name(&self) -> &str {
        &self.entry_point_name
    }

    fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }
}

/// Decodes configuration bytes into a record type.
///
/// The record type's `Deserialize` implementation is the schema descriptor.
pub trait ConfigDecoder {
    /// Decode `bytes` into a record.
    fn decode<R: DeserializeOwned>(&self, bytes: &[u8]) -> Result<R, BoxError>;
}

/// JSON decoder, the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl ConfigDecoder for JsonDecoder {
    fn decode<R: DeserializeOwned>(&self, bytes: &[u8]) -> Result<R, BoxError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// TOML decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlDecoder;

impl ConfigDecoder for TomlDecoder {
    fn decode<R: DeserializeOwned>(&self, bytes: &[u8]) -> Result<R, BoxError> {
        let content = std::str::from_utf8(bytes)?;
        Ok(toml::from_str(content)?)
    }
}
