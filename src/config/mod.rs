pub mod error;
pub mod load;
pub mod paths;
pub mod save;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_global_settings, load_settings_from, BASE_URL_ENV};
pub use paths::{
    bootstrap_state_root, default_global_config_path, default_state_root_path, StatePaths,
    GLOBAL_SETTINGS_FILE_NAME, GLOBAL_STATE_DIR, IDENTITIES_FILE_NAME, STATE_ROOT_ENV,
};
pub use save::save_settings;
pub use settings::{
    ConnectionConfig, PipelineConfig, Settings, StatusQueryConfig, WORKFLOW_ID_PLACEHOLDER,
};
