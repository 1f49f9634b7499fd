//! Runtime configuration for entry points.
//!
//! # Responsibility
//! - Resolve where the document database lives and which collection to use.
//! - Keep environment lookups out of the store and projector.
//!
//! # Invariants
//! - `collection` is never blank and never contains `/`.
//! - Environment values are layered over defaults; entry-point flags are
//!   layered over the environment through `with_overrides`.

use ::config::{Config, Environment, Map};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Prefix of the environment variables read by [`BackendConfig::from_env`]
/// (`ACTIVITY_DB_PATH`, `ACTIVITY_COLLECTION`).
pub const ENV_PREFIX: &str = "ACTIVITY";
pub const DB_PATH_ENV: &str = "ACTIVITY_DB_PATH";
pub const COLLECTION_ENV: &str = "ACTIVITY_COLLECTION";
pub const DEFAULT_COLLECTION: &str = "activities";

const DEFAULT_DB_FILE_NAME: &str = "activity.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Load(::config::ConfigError),
    BlankCollection,
    InvalidCollection(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(err) => write!(f, "failed to load configuration: {err}"),
            Self::BlankCollection => write!(f, "collection name cannot be empty"),
            Self::InvalidCollection(name) => {
                write!(f, "collection name `{name}` must not contain `/`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Load(err) => Some(err),
            Self::BlankCollection | Self::InvalidCollection(_) => None,
        }
    }
}

impl From<::config::ConfigError> for ConfigError {
    fn from(value: ::config::ConfigError) -> Self {
        Self::Load(value)
    }
}

/// Location of the backing store and the collection to bind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    pub db_path: PathBuf,
    pub collection: String,
}

impl BackendConfig {
    pub fn new(db_path: impl Into<PathBuf>, collection: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            db_path: db_path.into(),
            collection: normalize_collection(collection)?,
        })
    }

    /// Reads `ACTIVITY_DB_PATH` and `ACTIVITY_COLLECTION`, falling back to
    /// `<temp>/activity.sqlite3` and `activities`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Replaces the database path and/or collection with explicit values.
    pub fn with_overrides(
        self,
        db_path: Option<PathBuf>,
        collection: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let collection = collection.map(str::to_string).unwrap_or(self.collection);
        let db_path = db_path
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or(self.db_path);
        Self::new(db_path, &collection)
    }

    /// Builds the layered config; `vars` stands in for the process
    /// environment when given.
    fn load(vars: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let raw: BackendConfig = Config::builder()
            .set_default("db_path", default_db_path().to_string_lossy().as_ref())?
            .set_default("collection", DEFAULT_COLLECTION)?
            .add_source(Environment::with_prefix(ENV_PREFIX).source(vars))
            .build()?
            .try_deserialize()?;

        let db_path = match raw.db_path.to_string_lossy().trim() {
            "" => default_db_path(),
            trimmed => PathBuf::from(trimmed),
        };
        Self::new(db_path, &raw.collection)
    }
}

/// Database file used when nothing else is configured.
pub fn default_db_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
}

fn normalize_collection(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::BlankCollection);
    }
    if trimmed.contains('/') {
        return Err(ConfigError::InvalidCollection(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}
