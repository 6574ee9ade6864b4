use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            // a private in-memory database per connection otherwise
            max_connections: 1,
        }
    }
}

/// Library configuration; hand it to `Db::from_settings`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
}

impl Settings {
    /// Parse settings from a JSON document; missing sections fall back to defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source)
            .map_err(|e| Error::Configuration(format!("invalid settings: {}", e)))
    }
}
