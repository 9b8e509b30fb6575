use serde::{Deserialize, Serialize};

use super::{parse_env, ConfigError, EnvLookup};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleMode {
    /// In-process development feed, exposed under `/feed`
    #[default]
    Playground,
    /// Remote feed reached over HTTP
    Http,
}

impl std::str::FromStr for OracleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "playground" => Ok(OracleMode::Playground),
            "http" => Ok(OracleMode::Http),
            other => Err(format!("unknown oracle mode {other:?}")),
        }
    }
}

/// `[oracle]` section: which feed the proxy reads through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSection {
    pub mode: OracleMode,

    /// Base URL of the remote feed (http mode)
    pub url: Option<String>,

    pub timeout_secs: u64,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            mode: OracleMode::Playground,
            url: None,
            timeout_secs: 10,
        }
    }
}

impl OracleSection {
    pub(super) fn apply_env(&mut self, lookup: &EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("ORACLE_GUARD_ORACLE_MODE") {
            self.mode = val
                .parse()
                .map_err(|e: String| ConfigError::Env("ORACLE_GUARD_ORACLE_MODE".into(), e))?;
        }
        if let Some(val) = lookup("ORACLE_GUARD_ORACLE_URL") {
            self.url = Some(val.trim().to_string());
        }
        if let Some(val) = lookup("ORACLE_GUARD_ORACLE_TIMEOUT_SECS") {
            self.timeout_secs = parse_env("ORACLE_GUARD_ORACLE_TIMEOUT_SECS", &val)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("oracle.timeout_secs must be positive".into()));
        }
        if self.mode == OracleMode::Http {
            let url = self.url.as_deref().unwrap_or("");
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "oracle.url must be an http(s) URL in http mode, got {url:?}"
                )));
            }
        }
        Ok(())
    }
}
