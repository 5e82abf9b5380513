use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const WORKFLOW_ID_PLACEHOLDER: &str = "{workflow_id}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub status_query: StatusQueryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connection: ConnectionConfig::default(),
            status_query: StatusQueryConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusQueryConfig {
    #[serde(default = "default_status_path")]
    pub path: String,
    #[serde(default = "default_status_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StatusQueryConfig {
    fn default() -> Self {
        Self {
            path: default_status_path(),
            timeout_ms: default_status_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_total_stages")]
    pub total_stages: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            total_stages: default_total_stages(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_socket_path() -> String {
    "/api/ws/{workflow_id}".to_string()
}

fn default_status_path() -> String {
    "/status/{workflow_id}".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    10_000
}

fn default_idle_poll_ms() -> u64 {
    40
}

fn default_status_timeout_ms() -> u64 {
    5000
}

fn default_total_stages() -> usize {
    12
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`base_url` must be non-empty".to_string(),
            ));
        }
        if !self.connection.socket_path.contains(WORKFLOW_ID_PLACEHOLDER) {
            return Err(ConfigError::Settings(format!(
                "`connection.socket_path` must contain `{WORKFLOW_ID_PLACEHOLDER}`"
            )));
        }
        if !self.status_query.path.contains(WORKFLOW_ID_PLACEHOLDER) {
            return Err(ConfigError::Settings(format!(
                "`status_query.path` must contain `{WORKFLOW_ID_PLACEHOLDER}`"
            )));
        }
        if self.connection.max_reconnect_attempts == 0 {
            return Err(ConfigError::Settings(
                "connection.max_reconnect_attempts must be > 0".to_string(),
            ));
        }
        if self.connection.reconnect_base_delay_ms == 0 {
            return Err(ConfigError::Settings(
                "connection.reconnect_base_delay_ms must be > 0".to_string(),
            ));
        }
        if self.connection.reconnect_base_delay_ms > self.connection.reconnect_max_delay_ms {
            return Err(ConfigError::Settings(
                "connection.reconnect_base_delay_ms must not exceed connection.reconnect_max_delay_ms"
                    .to_string(),
            ));
        }
        if self.connection.idle_poll_ms == 0 {
            return Err(ConfigError::Settings(
                "connection.idle_poll_ms must be > 0".to_string(),
            ));
        }
        if self.status_query.timeout_ms == 0 {
            return Err(ConfigError::Settings(
                "status_query.timeout_ms must be > 0".to_string(),
            ));
        }
        if self.pipeline.total_stages == 0 {
            return Err(ConfigError::Settings(
                "pipeline.total_stages must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
