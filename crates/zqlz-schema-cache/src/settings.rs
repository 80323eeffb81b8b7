//! Startup and shutdown settings for the foreign key cache
//!
//! ```toml
//! dump_path = "/var/lib/app/foreign_keys.dump"
//! warm_on_startup = true
//! persist = "unless_exists"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use zqlz_core::{Result, ZqlzError};

use crate::ForeignKeyCache;

/// When to write the cache back to `dump_path`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Never write a dump
    Never,
    /// Write once, keeping any dump that already exists
    #[default]
    UnlessExists,
    /// Overwrite the dump every time
    Always,
}

/// Where the cache dump lives and how it is used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForeignKeyCacheSettings {
    /// Dump file. Without one, warming and persisting are no-ops.
    pub dump_path: Option<PathBuf>,
    /// Load the dump, if present, before the first lookup
    pub warm_on_startup: bool,
    pub persist: PersistMode,
}

impl Default for ForeignKeyCacheSettings {
    fn default() -> Self {
        Self {
            dump_path: None,
            warm_on_startup: true,
            persist: PersistMode::default(),
        }
    }
}

impl ForeignKeyCacheSettings {
    /// Settings using `path` for the dump, other fields at their defaults
    pub fn with_dump_path(path: impl Into<PathBuf>) -> Self {
        Self {
            dump_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parse settings from TOML
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| {
            ZqlzError::Configuration(format!("Invalid foreign key cache settings: {}", e))
        })
    }

    /// Read settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading foreign key cache settings");
        Self::from_toml_str(&contents)
    }

    /// Load the dump into `cache` if warming is enabled and the dump exists.
    /// Returns whether anything was loaded.
    pub fn warm(&self, cache: &ForeignKeyCache) -> Result<bool> {
        match &self.dump_path {
            Some(path) if self.warm_on_startup => cache.load_from_file_if_exists(path),
            _ => Ok(false),
        }
    }

    /// Write `cache` to the dump according to `persist`. Returns whether a
    /// dump was written.
    pub fn persist(&self, cache: &ForeignKeyCache) -> Result<bool> {
        let Some(path) = &self.dump_path else {
            return Ok(false);
        };
        match self.persist {
            PersistMode::Never => Ok(false),
            PersistMode::UnlessExists => cache.dump_to_file_unless_exists(path),
            PersistMode::Always => cache.dump_to_file(path).map(|_| true),
        }
    }
}
