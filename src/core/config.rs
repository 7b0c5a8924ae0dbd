//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::activity::category::SourceCategory;
use crate::core::errors::{FxaError, Result};

/// Full engine configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub store: StoreConfig,
    pub tables: TablesConfig,
    pub paths: PathsConfig,
}

/// Request shaping and fan-out knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Page size used when the caller does not supply one.
    pub default_page_size: u32,
    /// Upper clamp for caller-supplied page sizes.
    pub max_page_size: u32,
    /// Issue the five category fetches concurrently.
    pub parallel: bool,
}

/// Backing store location and limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub sqlite_path: PathBuf,
    /// Statement busy timeout; the only time bound on a fetch.
    pub busy_timeout_ms: u64,
}

/// Per-category backing table names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TablesConfig {
    pub fetching: String,
    pub processing: String,
    pub normalization: String,
    pub refinement: String,
    pub calculation: String,
}

/// Filesystem paths used by fxa.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 200,
            parallel: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: data_dir().join("activity.sqlite3"),
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            fetching: SourceCategory::Fetching.spec().default_table.to_string(),
            processing: SourceCategory::Processing.spec().default_table.to_string(),
            normalization: SourceCategory::Normalization.spec().default_table.to_string(),
            refinement: SourceCategory::Refinement.spec().default_table.to_string(),
            calculation: SourceCategory::Calculation.spec().default_table.to_string(),
        }
    }
}

impl TablesConfig {
    /// Configured table name for a category.
    #[must_use]
    pub fn table_for(&self, category: SourceCategory) -> &str {
        match category {
            SourceCategory::Fetching => &self.fetching,
            SourceCategory::Processing => &self.processing,
            SourceCategory::Normalization => &self.normalization,
            SourceCategory::Refinement => &self.refinement,
            SourceCategory::Calculation => &self.calculation,
        }
    }

    fn slot_mut(&mut self, category: SourceCategory) -> &mut String {
        match category {
            SourceCategory::Fetching => &mut self.fetching,
            SourceCategory::Processing => &mut self.processing,
            SourceCategory::Normalization => &mut self.normalization,
            SourceCategory::Refinement => &mut self.refinement,
            SourceCategory::Calculation => &mut self.calculation,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: home_dir().join(".config").join("fxa").join("config.toml"),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            tracing::warn!("HOME not set, falling back to /tmp for fxa paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("fxa")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| FxaError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(FxaError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FXA_ENGINE_DEFAULT_PAGE_SIZE") {
            self.engine.default_page_size = parse_env_u32("FXA_ENGINE_DEFAULT_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("FXA_ENGINE_MAX_PAGE_SIZE") {
            self.engine.max_page_size = parse_env_u32("FXA_ENGINE_MAX_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("FXA_ENGINE_PARALLEL") {
            self.engine.parallel = parse_env_bool("FXA_ENGINE_PARALLEL", &raw)?;
        }
        if let Some(raw) = lookup("FXA_STORE_SQLITE_PATH") {
            self.store.sqlite_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("FXA_STORE_BUSY_TIMEOUT_MS") {
            self.store.busy_timeout_ms = parse_env_u64("FXA_STORE_BUSY_TIMEOUT_MS", &raw)?;
        }
        for category in SourceCategory::ALL {
            let name = format!("FXA_TABLE_{}", category.as_str().to_ascii_uppercase());
            if let Some(raw) = lookup(&name) {
                *self.tables.slot_mut(category) = raw.trim().to_string();
            }
        }
        Ok(())
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.engine.default_page_size == 0 || self.engine.max_page_size == 0 {
            return Err(FxaError::InvalidConfig {
                details: "engine.default_page_size and engine.max_page_size must be > 0"
                    .to_string(),
            });
        }

        if self.engine.default_page_size > self.engine.max_page_size {
            return Err(FxaError::InvalidConfig {
                details: format!(
                    "engine.default_page_size ({}) must be <= engine.max_page_size ({})",
                    self.engine.default_page_size, self.engine.max_page_size
                ),
            });
        }

        // Table names are interpolated into SQL text.
        for category in SourceCategory::ALL {
            let table = self.tables.table_for(category);
            if !is_sql_identifier(table) {
                return Err(FxaError::InvalidConfig {
                    details: format!(
                        "tables.{category} must be a plain SQL identifier, got {table:?}"
                    ),
                });
            }
        }

        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
#[must_use]
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u32(name: &str, raw: &str) -> Result<u32> {
    raw.trim().parse::<u32>().map_err(|error| FxaError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|error| FxaError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim().parse::<bool>().map_err(|error| FxaError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
