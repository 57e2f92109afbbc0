pub mod logging;
pub mod resolver;

pub use logging::LoggingConfig;
pub use resolver::{ResolverConfig, TrustAnchorEntry};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file, or defaults when no path is
    /// given.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_string(),
                    source,
                })?;
                toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_string(),
                    source,
                })?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "query_timeout_ms must be positive".to_string(),
            ));
        }
        if self.resolver.udp_payload_size < 512 {
            return Err(ConfigError::Invalid(
                "udp_payload_size must be at least 512".to_string(),
            ));
        }
        for anchor in &self.resolver.root_trust_anchors {
            if let TrustAnchorEntry::Ds { digest, .. } = anchor {
                if digest.is_empty() || digest.len() % 2 != 0 {
                    return Err(ConfigError::Invalid(
                        "trust anchor DS digest must be non-empty hex".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}
