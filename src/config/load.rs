use super::{default_global_config_path, ConfigError, Settings};
use std::path::Path;

pub const BASE_URL_ENV: &str = "STAGEWIRE_BASE_URL";

pub fn load_global_settings() -> Result<Settings, ConfigError> {
    let path = default_global_config_path()?;
    load_settings_from(&path)
}

/// Missing file means defaults; the env base URL always wins.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let mut settings = if path.exists() {
        Settings::from_path(path)?
    } else {
        Settings::default()
    };
    if let Some(base_url) = std::env::var(BASE_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        settings.base_url = base_url;
    }
    settings.validate()?;
    Ok(settings)
}
