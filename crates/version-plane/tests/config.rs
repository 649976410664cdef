use serial_test::serial;
use std::io::Write;
use tempfile::TempDir;
use version_plane::config::{config_file_path, EffectiveConfig, LogFormat, DEFAULT_DATABASE_URL, DEFAULT_LISTEN};

const ENV_KEYS: [&str; 4] = ["DATABASE_URL", "VERSION_PLANE_LISTEN", "VERSION_PLANE_MAX_CONNECTIONS", "VERSION_PLANE_LOG_FORMAT"];

fn write_cfg(dir: &TempDir, content: Option<&str>) {
    let path = dir.path().join("config.toml");
    std::env::set_var("VERSION_PLANE_CONFIG", &path);
    for k in ENV_KEYS { std::env::remove_var(k); }
    if let Some(c) = content {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(c.as_bytes()).unwrap();
    }
}

#[test]
#[serial]
fn missing_file_uses_defaults() {
    let td = TempDir::new().unwrap();
    write_cfg(&td, None);
    assert_eq!(config_file_path(), td.path().join("config.toml"));
    let cfg = EffectiveConfig::load().unwrap();
    assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
    assert_eq!(cfg.listen, DEFAULT_LISTEN);
    assert_eq!(cfg.log_format, LogFormat::Compact);
}

#[test]
#[serial]
fn parse_error_is_reported() {
    let td = TempDir::new().unwrap();
    write_cfg(&td, Some("database_url = [unclosed"));
    let err = EffectiveConfig::load().unwrap_err();
    let s = format!("{err:#}");
    assert!(s.contains("failed to parse config"), "expected parse error, got: {s}");
}

#[test]
#[serial]
fn file_values_then_env_overrides() {
    let td = TempDir::new().unwrap();
    write_cfg(&td, Some("database_url = 'sqlite://file.db'\nlisten = '127.0.0.1:9000'\nmax_connections = 8\nlog_format = 'json'\n"));
    let cfg = EffectiveConfig::load().unwrap();
    assert_eq!(cfg.database_url, "sqlite://file.db");
    assert_eq!(cfg.listen, "127.0.0.1:9000");
    assert_eq!(cfg.max_connections, 8);
    assert_eq!(cfg.log_format, LogFormat::Json);

    std::env::set_var("DATABASE_URL", "sqlite://env.db");
    std::env::set_var("VERSION_PLANE_MAX_CONNECTIONS", "2");
    std::env::set_var("VERSION_PLANE_LOG_FORMAT", "compact");
    let cfg = EffectiveConfig::load().unwrap();
    assert_eq!(cfg.database_url, "sqlite://env.db");
    assert_eq!(cfg.max_connections, 2);
    assert_eq!(cfg.log_format, LogFormat::Compact);
    for k in ENV_KEYS { std::env::remove_var(k); }
}

#[test]
#[serial]
fn bad_env_values_are_rejected() {
    let td = TempDir::new().unwrap();
    write_cfg(&td, None);
    std::env::set_var("VERSION_PLANE_MAX_CONNECTIONS", "lots");
    assert!(EffectiveConfig::load().is_err());
    std::env::remove_var("VERSION_PLANE_MAX_CONNECTIONS");
    std::env::set_var("VERSION_PLANE_LOG_FORMAT", "xml");
    assert!(EffectiveConfig::load().is_err());
    std::env::remove_var("VERSION_PLANE_LOG_FORMAT");
}
