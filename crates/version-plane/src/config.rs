//! Runtime configuration: optional TOML file overlaid by environment variables.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://version-plane.db";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat { #[default] Compact, Json }

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" | "text" => Some(Self::Compact),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub listen: Option<String>,
    pub max_connections: Option<u32>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub database_url: String,
    pub listen: String,
    pub max_connections: u32,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl EffectiveConfig {
    pub fn load() -> Result<Self> {
        let cfg_path = config_file_path();
        debug!(path=?cfg_path, exists=?cfg_path.exists(), "config.load.attempt");
        let mut file_cfg: FileConfig = if cfg_path.exists() {
            let content = fs::read_to_string(&cfg_path).with_context(|| format!("failed to read config {cfg_path:?}"))?;
            toml::from_str(&content).with_context(|| format!("failed to parse config {cfg_path:?}"))?
        } else { FileConfig::default() };

        if let Some(v) = env_nonempty("DATABASE_URL") { file_cfg.database_url = Some(v); }
        if let Some(v) = env_nonempty("VERSION_PLANE_LISTEN") { file_cfg.listen = Some(v); }
        if let Some(v) = env_nonempty("VERSION_PLANE_MAX_CONNECTIONS") {
            let n: u32 = v.parse().with_context(|| format!("VERSION_PLANE_MAX_CONNECTIONS={v} is not a number"))?;
            file_cfg.max_connections = Some(n);
        }
        if let Some(v) = env_nonempty("VERSION_PLANE_LOG_FORMAT") { file_cfg.log_format = Some(v); }

        let log_format = match file_cfg.log_format.as_deref() {
            None => LogFormat::default(),
            Some(raw) => LogFormat::parse(raw).with_context(|| format!("unknown log format {raw:?}"))?,
        };
        Ok(Self {
            database_url: file_cfg.database_url.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            listen: file_cfg.listen.unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            max_connections: file_cfg.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS).max(1),
            log_level: file_cfg.log_level.unwrap_or_else(|| "info".to_string()),
            log_format,
        })
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn config_dir() -> PathBuf { dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("version-plane") }

/// `VERSION_PLANE_CONFIG` wins over the per-user config directory.
pub fn config_file_path() -> PathBuf {
    match env_nonempty("VERSION_PLANE_CONFIG") {
        Some(p) => PathBuf::from(p),
        None => config_dir().join("config.toml"),
    }
}
