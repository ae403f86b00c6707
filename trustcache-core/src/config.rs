//! Store and registry configuration.
//!
//! A `StoreConfig` is also the registry key: two configs that compare equal
//! share one store.

use crate::{ConfigError, ObjectKind, ResourceIdentity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Environment variable naming the registry config file.
pub const CONFIG_ENV_VAR: &str = "TRUSTCACHE_CONFIG";

/// Configuration identity of one store: object kind plus resource root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub kind: ObjectKind,
    /// Directory the store's resource names are resolved against.
    pub root: PathBuf,
    /// File extensions (without the dot) listed by collection loads.
    /// Empty means every regular file under `root`.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl StoreConfig {
    /// Create a config with a lexically normalized root.
    pub fn new(kind: ObjectKind, root: impl AsRef<Path>) -> Self {
        Self {
            kind,
            root: normalize_root(root.as_ref()),
            extensions: Vec::new(),
        }
    }

    /// Restrict collection loads to the given extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self.extensions.sort();
        self.extensions.dedup();
        self
    }

    /// Return the same config with its root and extensions normalized, so
    /// that equal stores compare equal regardless of spelling.
    pub fn normalized(&self) -> Self {
        Self::new(self.kind, &self.root).with_extensions(self.extensions.iter().cloned())
    }

    /// Returns true if a file name passes the extension filter.
    pub fn accepts(&self, file_name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|x| *x == e))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "root".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        for ext in &self.extensions {
            if ext.is_empty() || ext.starts_with('.') || ext.contains('/') {
                return Err(ConfigError::InvalidValue {
                    field: "extensions".to_string(),
                    reason: format!("'{ext}' must be a bare extension like \"pem\""),
                });
            }
        }
        Ok(())
    }
}

fn normalize_root(root: &Path) -> PathBuf {
    if root.as_os_str().is_empty() {
        return PathBuf::new();
    }
    PathBuf::from(ResourceIdentity::from_path(root).location())
}

/// Top-level configuration: the stores an application wants opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    pub stores: Vec<StoreConfig>,
}

impl RegistryConfig {
    /// Load from an explicit path (the CLI's `--config`), falling back to
    /// `TRUSTCACHE_CONFIG`, then validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(config_path_from_env)
            .ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: RegistryConfig = toml::from_str(contents)?;
        let config = RegistryConfig {
            stores: config.stores.iter().map(StoreConfig::normalized).collect(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stores.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "stores".to_string(),
                reason: "at least one store must be configured".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for (i, store) in self.stores.iter().enumerate() {
            store.validate().map_err(|e| match e {
                ConfigError::InvalidValue { field, reason } => ConfigError::InvalidValue {
                    field: format!("stores[{i}].{field}"),
                    reason,
                },
                other => other,
            })?;
            if !seen.insert(store) {
                return Err(ConfigError::InvalidValue {
                    field: format!("stores[{i}]"),
                    reason: format!("duplicate store for {} at {}", store.kind, store.root.display()),
                });
            }
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}
