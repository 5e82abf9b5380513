use super::ConfigError;
use std::fs;
use std::path::PathBuf;

pub const GLOBAL_STATE_DIR: &str = ".stagewire";
pub const GLOBAL_SETTINGS_FILE_NAME: &str = "config.yaml";
pub const IDENTITIES_FILE_NAME: &str = "identities.json";
pub const STATE_ROOT_ENV: &str = "STAGEWIRE_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.root.clone(), self.root.join("logs")]
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(GLOBAL_SETTINGS_FILE_NAME)
    }

    pub fn identities_file(&self) -> PathBuf {
        self.root.join(IDENTITIES_FILE_NAME)
    }

    pub fn client_log_path(&self) -> PathBuf {
        crate::shared::logging::client_log_path(&self.root)
    }
}

/// `$STAGEWIRE_HOME` when set, otherwise `$HOME/.stagewire`.
pub fn default_state_root_path() -> Result<PathBuf, ConfigError> {
    if let Some(root) = std::env::var_os(STATE_ROOT_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(GLOBAL_STATE_DIR))
}

pub fn default_global_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_state_root_path()?.join(GLOBAL_SETTINGS_FILE_NAME))
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), ConfigError> {
    for path in paths.required_directories() {
        fs::create_dir_all(&path).map_err(|source| ConfigError::CreateDir {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
