use serde::{Deserialize, Serialize};

use super::{parse_env, ConfigError, EnvLookup};
use crate::types::Address;

/// `[node]` section: where the node listens and keeps its data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Socket address for the HTTP API
    pub listen: String,

    /// sled database directory
    pub data_dir: String,

    /// Guardian installed when the database is empty. Ignored once a
    /// persisted instance exists.
    pub initial_guardian: Option<Address>,

    /// Request body cap for the HTTP API
    pub max_body_bytes: usize,

    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7171".to_string(),
            data_dir: "./oracle-guard-data".to_string(),
            initial_guardian: None,
            max_body_bytes: 64 * 1024,
            cors_origins: Vec::new(),
        }
    }
}

impl NodeSection {
    pub(super) fn apply_env(&mut self, lookup: &EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("ORACLE_GUARD_LISTEN") {
            self.listen = val.trim().to_string();
        }
        if let Some(val) = lookup("ORACLE_GUARD_DATA_DIR") {
            self.data_dir = val.trim().to_string();
        }
        if let Some(val) = lookup("ORACLE_GUARD_INITIAL_GUARDIAN") {
            self.initial_guardian = Some(parse_env("ORACLE_GUARD_INITIAL_GUARDIAN", &val)?);
        }
        if let Some(val) = lookup("ORACLE_GUARD_MAX_BODY_BYTES") {
            self.max_body_bytes = parse_env("ORACLE_GUARD_MAX_BODY_BYTES", &val)?;
        }
        // comma separated
        if let Some(val) = lookup("ORACLE_GUARD_CORS_ORIGINS") {
            self.cors_origins = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen
            .parse::<std::net::SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("node.listen {:?}: {e}", self.listen)))?;
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("node.data_dir must not be empty".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("node.max_body_bytes must be positive".into()));
        }
        Ok(())
    }
}
