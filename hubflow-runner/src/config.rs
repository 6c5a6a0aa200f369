//! Process configuration.
//!
//! `AppConfig` is built once at startup, from the environment or from a TOML
//! file with the environment layered on top, and passed by reference to
//! everything that needs it. Nothing reads the environment after that.
//!
//! | key | env var | default |
//! |---|---|---|
//! | store_url | `HUBFLOW_STORE_URL` | required |
//! | production | `HUBFLOW_PRODUCTION` | false |
//! | pool_size | `HUBFLOW_POOL_SIZE` | 4 |
//! | schemas | `HUBFLOW_SCHEMAS` (comma separated) | `logistics` |
//! | api_bind | `HUBFLOW_API_BIND` | `127.0.0.1:8000` |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use hubflow_core::query::{Identifier, IdentifierError, DEFAULT_SCHEMA};

pub const ENV_STORE_URL: &str = "HUBFLOW_STORE_URL";
pub const ENV_PRODUCTION: &str = "HUBFLOW_PRODUCTION";
pub const ENV_POOL_SIZE: &str = "HUBFLOW_POOL_SIZE";
pub const ENV_SCHEMAS: &str = "HUBFLOW_SCHEMAS";
pub const ENV_API_BIND: &str = "HUBFLOW_API_BIND";

const STORE_SCHEME: &str = "file://";
const DEFAULT_POOL_SIZE: usize = 4;
const DEFAULT_API_BIND: &str = "127.0.0.1:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{ENV_STORE_URL} is empty. Set it in the environment or the config file")]
    MissingStoreUrl,

    #[error("invalid scheme in store URL '{0}': must be 'file://'")]
    InvalidScheme(String),

    #[error("incomplete store URL '{0}': missing path")]
    MissingPath(String),

    #[error("pool size must be at least 1")]
    ZeroPoolSize,

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid schema in allow-list: {0}")]
    InvalidSchema(#[from] IdentifierError),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// `1`, `true`, `yes` and `on` (any case) are true; everything else is false.
pub fn str2bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Validated process configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub store_url: String,
    pub production: bool,
    pub pool_size: usize,
    /// Schemas the introspection endpoints may reveal.
    pub schemas: Vec<Identifier>,
    pub api_bind: String,
}

/// On-disk shape of the TOML file. Every key is optional so the environment
/// can fill the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    store_url: Option<String>,
    production: Option<bool>,
    pool_size: Option<usize>,
    schemas: Option<Vec<Identifier>>,
    api_bind: Option<String>,
}

impl AppConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(FileConfig::default(), |key| std::env::var(key).ok())
    }

    /// Build from a TOML file, with environment variables overriding.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, |key| std::env::var(key).ok())
    }

    /// `from_file` when a path is given, otherwise `from_env`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::from_env(),
        }
    }

    /// Parse TOML text, then apply overrides from `lookup`.
    pub fn from_toml_str(
        text: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text)?;
        Self::from_lookup(file, lookup)
    }

    fn from_lookup(
        file: FileConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let store_url = lookup(ENV_STORE_URL)
            .or(file.store_url)
            .unwrap_or_default();

        let production = match lookup(ENV_PRODUCTION) {
            Some(v) => str2bool(&v),
            None => file.production.unwrap_or(false),
        };

        let pool_size = match lookup(ENV_POOL_SIZE) {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_POOL_SIZE,
                value: v,
            })?,
            None => file.pool_size.unwrap_or(DEFAULT_POOL_SIZE),
        };

        let schemas = match lookup(ENV_SCHEMAS) {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Identifier::parse)
                .collect::<Result<Vec<_>, _>>()?,
            None => match file.schemas {
                Some(s) => s,
                None => vec![Identifier::parse(DEFAULT_SCHEMA)?],
            },
        };

        let api_bind = lookup(ENV_API_BIND)
            .or(file.api_bind)
            .unwrap_or_else(|| DEFAULT_API_BIND.to_string());

        let config = Self {
            store_url,
            production,
            pool_size,
            schemas,
            api_bind,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.store_root()?;
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        Ok(())
    }

    /// Filesystem root of the Parquet store named by `store_url`.
    pub fn store_root(&self) -> Result<PathBuf, ConfigError> {
        let url = self.store_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingStoreUrl);
        }
        let Some(path) = url.strip_prefix(STORE_SCHEME) else {
            return Err(ConfigError::InvalidScheme(url.to_string()));
        };
        if path.is_empty() {
            return Err(ConfigError::MissingPath(url.to_string()));
        }
        Ok(PathBuf::from(path))
    }

    /// Whether `schema` is on the introspection allow-list.
    pub fn allows_schema(&self, schema: &Identifier) -> bool {
        self.schemas.contains(schema)
    }
}
