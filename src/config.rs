//! Engine configuration.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! ```toml
//! [limits]
//! max_in_list = 1000
//! max_predicate_depth = 64
//! max_order_items = 16
//!
//! [versioning]
//! origin = "version_origin"
//! workspace = "version_workspace"
//! state = "version_state"
//!
//! [localization]
//! language = "language_id"
//! source = "translation_source"
//! all_languages = -1
//!
//! [output]
//! sort_alias_prefix = "__sort_"
//! source_alias = "__source"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming an engine config file.
pub const CONFIG_ENV: &str = "STRATA_CONFIG";

/// Validated engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Size limits applied during validation.
    pub limits: Limits,
    /// Default column names for versioned tables.
    pub versioning: VersioningDefaults,
    /// Default column names for localized tables.
    pub localization: LocalizationDefaults,
    /// Names of synthetic output columns.
    pub output: OutputNames,
}

/// Size limits applied during expression validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Maximum number of literals in an `in` list.
    pub max_in_list: usize,
    /// Maximum nesting depth of a filter expression.
    pub max_predicate_depth: usize,
    /// Maximum number of items in an order expression.
    pub max_order_items: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_in_list: 1000,
            max_predicate_depth: 64,
            max_order_items: 16,
        }
    }
}

/// Column names used when a versioned table does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersioningDefaults {
    /// Points from an overlay row to the live row it shadows.
    pub origin: String,
    /// Workspace a row belongs to (0 = live).
    pub workspace: String,
    /// Version state marker.
    pub state: String,
}

impl Default for VersioningDefaults {
    fn default() -> Self {
        Self {
            origin: "version_origin".into(),
            workspace: "version_workspace".into(),
            state: "version_state".into(),
        }
    }
}

/// Column names used when a localized table does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalizationDefaults {
    /// Language id column.
    pub language: String,
    /// Points from a translation to its default-language source row.
    pub source: String,
    /// Language id meaning "all languages".
    pub all_languages: i64,
}

impl Default for LocalizationDefaults {
    fn default() -> Self {
        Self {
            language: "language_id".into(),
            source: "translation_source".into(),
            all_languages: -1,
        }
    }
}

/// Names of synthetic columns added to fetched rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputNames {
    /// Prefix of mangled aliases for sort-only columns.
    pub sort_alias_prefix: String,
    /// Alias of the discriminator literal naming a row's source table.
    pub source_alias: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            sort_alias_prefix: "__sort_".into(),
            source_alias: "__source".into(),
        }
    }
}

impl EngineConfig {
    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates an in-memory TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the config source: an explicit path, then `STRATA_CONFIG`,
    /// then the per-user default file if it exists, else built-in defaults.
    pub fn discover(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| default_config_path().filter(|p| p.exists()));
        match path {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_in_list == 0 {
            return Err(ConfigError::Invalid {
                key: "limits.max_in_list",
                reason: "must be at least 1".into(),
            });
        }
        if self.limits.max_predicate_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "limits.max_predicate_depth",
                reason: "must be at least 1".into(),
            });
        }
        if self.limits.max_order_items == 0 {
            return Err(ConfigError::Invalid {
                key: "limits.max_order_items",
                reason: "must be at least 1".into(),
            });
        }
        if self.localization.all_languages >= 0 {
            return Err(ConfigError::Invalid {
                key: "localization.all_languages",
                reason: format!(
                    "must be negative, got {}",
                    self.localization.all_languages
                ),
            });
        }
        let names = [
            ("versioning.origin", &self.versioning.origin),
            ("versioning.workspace", &self.versioning.workspace),
            ("versioning.state", &self.versioning.state),
            ("localization.language", &self.localization.language),
            ("localization.source", &self.localization.source),
            ("output.sort_alias_prefix", &self.output.sort_alias_prefix),
            ("output.source_alias", &self.output.source_alias),
        ];
        for (key, value) in names {
            if !crate::schema::is_identifier(value) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("'{value}' is not a valid identifier"),
                });
            }
        }
        Ok(())
    }
}

/// Per-user default config location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("strata").join("engine.toml"))
}
