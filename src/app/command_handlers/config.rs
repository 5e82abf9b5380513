use crate::app::command_support::{load_settings, map_config_err};
use crate::config::default_global_config_path;

pub fn cmd_config(args: &[String]) -> Result<String, String> {
    match args.first().map(String::as_str) {
        Some("show") if args.len() == 1 => {
            let settings = load_settings()?;
            serde_yaml::to_string(&settings).map_err(|e| format!("failed to encode settings: {e}"))
        }
        Some("path") if args.len() == 1 => Ok(default_global_config_path()
            .map_err(map_config_err)?
            .display()
            .to_string()),
        _ => Err("usage: config <show|path>".to_string()),
    }
}
