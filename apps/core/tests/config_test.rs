use kestrel_core::config::{self, Config, ConfigError};

#[test]
fn defaults_are_valid() {
    let cfg = Config::default();
    assert_eq!(cfg.debounce_ms, 200);
    assert_eq!(cfg.cache_max_entries, 250);
    assert_eq!(cfg.cache_expire_hours, 24);
    assert_eq!(cfg.clipboard_text_cap, 500);
    assert_eq!(cfg.clipboard_image_cap, 100);
    assert_eq!(cfg.app_result_limit, 8);
    assert!(cfg.data_dir.to_string_lossy().contains(".kestrel"));
    assert!(config::validate(&cfg).is_ok());
}

#[test]
fn rejects_out_of_range_values() {
    let dir = tempfile::tempdir().unwrap();
    let base = Config::with_data_dir(dir.path());

    let breakers: [fn(&mut Config); 6] = [
        |cfg| cfg.debounce_ms = 5,
        |cfg| cfg.app_result_limit = 200,
        |cfg| cfg.system_result_limit = 0,
        |cfg| cfg.clipboard_text_cap = 0,
        |cfg| cfg.cache_max_entries = 0,
        |cfg| cfg.http_timeout_secs = 0,
    ];
    for breaker in breakers {
        let mut cfg = base.clone();
        breaker(&mut cfg);
        assert!(matches!(config::validate(&cfg), Err(ConfigError::Invalid(_))));
    }
}

#[test]
fn missing_file_yields_defaults_next_to_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let cfg = config::load(Some(&path)).unwrap();
    assert_eq!(cfg.data_dir, dir.path());
    assert_eq!(cfg.config_path(), path);
    assert_eq!(cfg.cache_file(), dir.path().join("cache").join("search.json"));
    assert_eq!(cfg.clipboard_dir(), dir.path().join("clipboard"));
}

#[test]
fn saved_config_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::with_data_dir(dir.path().join("nested"));
    cfg.debounce_ms = 350;
    cfg.clipboard_enabled = false;
    cfg.extra_application_dirs = vec![dir.path().join("apps")];

    config::save(&cfg).unwrap();
    let loaded = config::load(Some(&cfg.config_path())).unwrap();
    assert_eq!(loaded, cfg);
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let data_dir = dir.path().display().to_string();
    std::fs::write(&path, format!("data_dir = {data_dir:?}\ndebounce_ms = 300\n")).unwrap();

    let cfg = config::load(Some(&path)).unwrap();
    assert_eq!(cfg.debounce_ms, 300);
    assert_eq!(cfg.cache_max_entries, 250);
}

#[test]
fn invalid_files_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "debounce_ms = \"fast\"").unwrap();
    assert!(matches!(config::load(Some(&path)), Err(ConfigError::Parse(_))));

    std::fs::write(&path, "debounce_ms = 1").unwrap();
    assert!(matches!(config::load(Some(&path)), Err(ConfigError::Invalid(_))));
}
