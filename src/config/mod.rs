//! Node configuration.
//!
//! Loaded from an optional TOML file, then overridden by `ORACLE_GUARD_*`
//! environment variables, then validated.
//!
//! ```toml
//! [node]
//! listen = "127.0.0.1:7171"
//! data_dir = "./oracle-guard-data"
//! initial_guardian = "0x..."
//!
//! [oracle]
//! mode = "http"
//! url = "http://127.0.0.1:7272"
//! ```

pub mod node;
pub mod oracle;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use node::NodeSection;
pub use oracle::{OracleMode, OracleSection};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(String, String),

    #[error("failed to parse {0}: {1}")]
    Parse(String, String),

    #[error("bad value for {0}: {1}")]
    Env(String, String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type EnvLookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

pub(crate) fn parse_env<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Env(key.to_string(), e.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeSection,
    pub oracle: OracleSection,
}

impl Config {
    /// Parse a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        Self::from_toml(&content)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// File (if any) plus process environment, validated
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(&|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ORACLE_GUARD_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: &EnvLookup<'_>) -> Result<(), ConfigError> {
        self.node.apply_env(lookup)?;
        self.oracle.apply_env(lookup)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.node.validate()?;
        self.oracle.validate()?;
        if self.node.initial_guardian.is_none() {
            return Err(ConfigError::Invalid(
                "node.initial_guardian is required (ORACLE_GUARD_INITIAL_GUARDIAN)".into(),
            ));
        }
        Ok(())
    }
}
