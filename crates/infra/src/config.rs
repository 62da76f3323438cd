//! Runtime settings.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Optional TOML file
//! 3. Environment variables: `SHELFWISE__*` (e.g. `SHELFWISE__DATABASE__URL`)

use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use shelfwise_catalog::{DeletePolicy, PredefinedParent, PredefinedParents};

const ENV_PREFIX: &str = "SHELFWISE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlx SQLite url, e.g. `sqlite://shelfwise.db` or `sqlite::memory:`.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://shelfwise.db".to_string(),
            max_connections: 5,
        }
    }
}

/// One configured predefined parent. `name` defaults to the capitalized key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredefinedParentSetting {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogSettings {
    pub predefined_parents: Vec<PredefinedParentSetting>,
    pub on_parent_delete: DeletePolicy,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            predefined_parents: PredefinedParents::default()
                .iter()
                .map(|p| PredefinedParentSetting {
                    key: p.key.clone(),
                    name: Some(p.name.clone()),
                })
                .collect(),
            on_parent_delete: DeletePolicy::default(),
        }
    }
}

impl CatalogSettings {
    /// The predefined parent table, skipping entries with a blank key.
    pub fn predefined_parents(&self) -> PredefinedParents {
        PredefinedParents::new(
            self.predefined_parents
                .iter()
                .filter(|p| !p.key.trim().is_empty())
                .map(|p| {
                    let mut entry = PredefinedParent::from_key(p.key.as_str());
                    if let Some(name) = p.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                        entry.name = name.to_string();
                    }
                    entry
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// All runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub catalog: CatalogSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load defaults, then `path` (if given; it must exist), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults overlaid with a TOML document (no environment).
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
