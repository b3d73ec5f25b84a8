//! Catalog configuration.
//!
//! Resolution order, later wins:
//! 1. built-in defaults (platform data dir, `catalog.db`, 300 s facet TTL,
//!    the bundled reconcile policy)
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. environment: `ARCHIVE_CATALOG_DB`, `ARCHIVE_CATALOG_DATA_DIR`,
//!    `ARCHIVE_CATALOG_FACET_TTL_SECS`, `ARCHIVE_CATALOG_POLICY`
//! 4. command-line flags, applied by the caller
//!
//! ```toml
//! data_dir = "/srv/archive"
//! db_path = "/srv/archive/catalog.db"
//! facet_ttl_secs = 600
//! policy_path = "/srv/archive/reconcile.toml"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::reconcile::ReconcilePolicy;
use crate::search::facets::DEFAULT_FACET_TTL;

pub const ENV_DB: &str = "ARCHIVE_CATALOG_DB";
pub const ENV_DATA_DIR: &str = "ARCHIVE_CATALOG_DATA_DIR";
pub const ENV_FACET_TTL: &str = "ARCHIVE_CATALOG_FACET_TTL_SECS";
pub const ENV_POLICY: &str = "ARCHIVE_CATALOG_POLICY";

const DB_FILE_NAME: &str = "catalog.db";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub data_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub facet_ttl_secs: Option<u64>,
    pub policy_path: Option<PathBuf>,
}

impl CatalogConfig {
    /// Load from `path` (which must exist) or, failing that, from the platform
    /// config file if one is present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = dotenvy::var(ENV_DB) {
            self.db_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = dotenvy::var(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = dotenvy::var(ENV_FACET_TTL) {
            let secs = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_FACET_TTL,
                value: v.clone(),
            })?;
            self.facet_ttl_secs = Some(secs);
        }
        if let Ok(v) = dotenvy::var(ENV_POLICY) {
            self.policy_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Explicit db path, else `catalog.db` inside the data dir.
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(DB_FILE_NAME))
    }

    pub fn facet_ttl(&self) -> Duration {
        self.facet_ttl_secs
            .map_or(DEFAULT_FACET_TTL, Duration::from_secs)
    }

    pub fn load_policy(&self) -> Result<ReconcilePolicy, ConfigError> {
        match &self.policy_path {
            Some(p) => ReconcilePolicy::load(p),
            None => Ok(ReconcilePolicy::builtin()),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "archive-catalog", "archive-catalog").map_or_else(
        || PathBuf::from("."),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "archive-catalog", "archive-catalog")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
