//! # API Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MERIDIAN_PORT=9090                                                 │
//! │     MERIDIAN_DB_PATH=/var/lib/meridian/meridian.db                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $MERIDIAN_CONFIG, else                                             │
//! │     ~/.config/meridian-pos/meridian.toml (Linux)                       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "meridian.db"
//! max_connections = 5
//!
//! [store]
//! name = "Westlands Branch"
//! currency = "KES"
//! order_prefix = "WL"
//! ```

use std::path::{Path, PathBuf};

use meridian_core::DEFAULT_ORDER_PREFIX;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "MERIDIAN_CONFIG";

const MAX_PREFIX_LEN: usize = 8;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("meridian.db"),
            max_connections: 5,
        }
    }
}

/// Store identity printed on receipts and used for order numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub name: String,
    /// ISO 4217 code. Informational; amounts are always minor units.
    pub currency: String,
    pub order_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            name: "Meridian Store".to_string(),
            currency: "USD".to_string(),
            order_prefix: DEFAULT_ORDER_PREFIX.to_string(),
        }
    }
}

// =============================================================================
// ApiConfig
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
}

impl ApiConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, `$MERIDIAN_CONFIG`, or the platform
    ///    config dir); a missing file is not an error
    /// 3. `MERIDIAN_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(?path, "Loading config from file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Applies `MERIDIAN_*` overrides read through `var`.
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("MERIDIAN_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Some(port) = var("MERIDIAN_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding port from environment");
                    self.server.port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring invalid MERIDIAN_PORT"),
            }
        }

        if let Some(path) = var("MERIDIAN_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = var("MERIDIAN_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Ignoring invalid MERIDIAN_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(name) = var("MERIDIAN_STORE_NAME") {
            self.store.name = name;
        }

        if let Some(currency) = var("MERIDIAN_CURRENCY") {
            self.store.currency = currency.to_uppercase();
        }

        if let Some(prefix) = var("MERIDIAN_ORDER_PREFIX") {
            self.store.order_prefix = prefix;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind_address is empty".into()));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be greater than 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        let currency = &self.store.currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Invalid(format!(
                "store.currency must be a 3-letter ISO code, got: {}",
                currency
            )));
        }

        let prefix = &self.store.order_prefix;
        if prefix.is_empty()
            || prefix.len() > MAX_PREFIX_LEN
            || !prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::Invalid(format!(
                "store.order_prefix must be 1-{} letters or digits, got: {}",
                MAX_PREFIX_LEN, prefix
            )));
        }

        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "meridian", "meridian-pos")
            .map(|dirs| dirs.config_dir().join("meridian.toml"))
    }
}
