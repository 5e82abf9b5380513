use stagewire::config::{
    bootstrap_state_root, load_settings_from, save_settings, Settings, StatePaths,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn config_settings_module_saves_and_reloads_settings() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested/config.yaml");
    let mut settings = Settings::default();
    settings.base_url = "http://engine.internal:8001".to_string();
    settings.connection.max_reconnect_attempts = 3;

    save_settings(&settings, &path).expect("save");
    let loaded = Settings::from_path(&path).expect("load");
    assert_eq!(loaded, settings);
}

#[test]
fn config_settings_module_invalid_file_reports_path() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("config.yaml");
    fs::write(&path, "connection:\n  idle_poll_ms: 0\n").expect("write");
    let err = load_settings_from(&path).expect_err("invalid settings");
    assert!(err.to_string().contains("idle_poll_ms"));

    fs::write(&path, "connection: [").expect("write");
    let err = load_settings_from(&path).expect_err("malformed yaml");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn config_settings_module_bootstraps_state_directories() {
    let temp = tempdir().expect("tempdir");
    let paths = StatePaths::new(temp.path().join(".stagewire"));
    bootstrap_state_root(&paths).expect("bootstrap");

    assert!(paths.root.join("logs").is_dir());
    assert!(paths.identities_file().ends_with(".stagewire/identities.json"));
    assert!(paths.client_log_path().ends_with("logs/client.log"));
    assert!(paths.settings_file().ends_with("config.yaml"));
}
