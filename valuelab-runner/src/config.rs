//! Tracker configuration loaded from TOML.
//!
//! Every section is optional; omitted values fall back to defaults and an
//! omitted `[[protocols]]` array falls back to the built-in table.
//!
//! ```toml
//! [fetch]
//! max_attempts = 3
//! base_delay_ms = 2000
//! timeout_secs = 10
//!
//! [pipeline]
//! history_days = 90
//! pacing_ms = 1500
//!
//! [storage]
//! database = "crypto_pe_history.db"
//! export = "protocol_data.json"
//!
//! [[protocols]]
//! key = "aave"
//! name = "Aave"
//! chain = "Multi-chain"
//! category = "Lending"
//! valuation_id = "aave"
//! revenue_slug = "aave"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use valuelab_core::data::{coingecko, defillama, RetryPolicy, DEFAULT_USER_AGENT};
use valuelab_core::domain::{
    builtin_protocols, ProtocolDescriptor, ProtocolTable, ProtocolTableError,
};

use crate::pipeline::PipelineSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid protocol table: {0}")]
    Protocols(#[from] ProtocolTableError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Size of the trend window attached to each result.
    pub history_days: usize,
    /// Pause after every protocol, success or skip.
    pub pacing_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_days: 90,
            pacing_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub export: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("crypto_pe_history.db"),
            export: PathBuf::from("protocol_data.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub valuation_base: String,
    pub revenue_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            valuation_base: coingecko::DEFAULT_BASE_URL.to_string(),
            revenue_base: defillama::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Full tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub fetch: FetchConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub endpoints: EndpointConfig,
    pub protocols: Vec<ProtocolDescriptor>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
            endpoints: EndpointConfig::default(),
            protocols: builtin_protocols(),
        }
    }
}

impl TrackerConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid("fetch.max_attempts must be at least 1".into()));
        }
        if self.pipeline.history_days == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.history_days must be at least 1".into(),
            ));
        }
        self.protocol_table()?;
        Ok(())
    }

    /// The validated, immutable protocol table.
    pub fn protocol_table(&self) -> Result<ProtocolTable, ConfigError> {
        Ok(ProtocolTable::new(self.protocols.clone())?)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            history_days: self.pipeline.history_days,
            pacing: Duration::from_millis(self.pipeline.pacing_ms),
        }
    }
}
