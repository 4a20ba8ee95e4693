//! Config files on disk: save, load, environment override and rejection of
//! bad content.

use tempfile::TempDir;

use tn3270r::config::{
    default_config_path, load_config, load_or_default, save_config, CONFIG_ENV_VAR,
};
use tn3270r::error::ConfigError;
use tn3270r::{ScreenSize, SessionConfig};

fn mainframe() -> SessionConfig {
    SessionConfig {
        lu_name: Some("TSO00042".to_string()),
        model: ScreenSize::Model4,
        throw_on_locked_screen_timeout: true,
        tn3270e_functions: vec!["RESPONSES".to_string()],
        ..SessionConfig::new("mvs.example.com", 992)
    }
}

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("session.json");

    save_config(&mainframe(), &path).unwrap();
    assert!(path.exists());

    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded, mainframe());
    assert!(loaded.use_tls);
}

#[test]
fn test_save_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    let config = SessionConfig {
        host: String::new(),
        ..SessionConfig::default()
    };

    assert!(matches!(
        save_config(&config, &path),
        Err(ConfigError::InvalidValue { key: "host", .. })
    ));
    assert!(!path.exists());
}

#[test]
fn test_load_rejects_bad_files() {
    let dir = TempDir::new().unwrap();

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{ not json").unwrap();
    assert!(matches!(load_config(&garbage), Err(ConfigError::Parse(_))));

    let bad_port = dir.path().join("port.json");
    std::fs::write(&bad_port, r#"{"host": "mvs", "port": 0}"#).unwrap();
    assert!(matches!(
        load_config(&bad_port),
        Err(ConfigError::InvalidValue { key: "port", .. })
    ));

    let missing = dir.path().join("missing.json");
    assert!(matches!(load_config(&missing), Err(ConfigError::Io(_))));
}

#[test]
fn test_environment_variable_selects_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("from_env.json");

    std::env::set_var(CONFIG_ENV_VAR, &path);
    assert_eq!(default_config_path(), path);
    assert_eq!(load_or_default().unwrap(), SessionConfig::default());

    save_config(&mainframe(), &path).unwrap();
    assert_eq!(load_or_default().unwrap().host, "mvs.example.com");
    std::env::remove_var(CONFIG_ENV_VAR);
}
