//! Daemon configuration loaded from the environment.
//!
//! Supported env vars (a `.env` file is honoured through `dotenvy`):
//! - `RESTREAMER_HOST`, `RESTREAMER_PORT`, `RESTREAMER_USERNAME`,
//!   `RESTREAMER_PASSWORD`, `RESTREAMER_HTTPS`, `RESTREAMER_TIMEOUT_SECS`
//! - `POLYCAST_SETTINGS_PATH`
//! - `API_BIND_ADDRESS`, `API_PORT`
//! - `SCHEDULER_TICK_SECS`
//! - `LOG_DIR`

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use restreamer_api::ConnectionConfig;

use crate::{Error, Result};

pub const DEFAULT_SETTINGS_PATH: &str = "polycast.json";
pub const DEFAULT_API_PORT: u16 = 12556;
pub const DEFAULT_SCHEDULER_TICK_SECS: u64 = 1;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Restreamer connection; the manager runs without a client when no
    /// username is configured.
    pub restreamer: ConnectionConfig,
    pub settings_path: PathBuf,
    pub api_bind_address: String,
    pub api_port: u16,
    pub scheduler_tick: Duration,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            restreamer: ConnectionConfig::default(),
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            api_bind_address: "0.0.0.0".to_string(),
            api_port: DEFAULT_API_PORT,
            scheduler_tick: Duration::from_secs(DEFAULT_SCHEDULER_TICK_SECS),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(host) = get("RESTREAMER_HOST") {
            config.restreamer.host = host;
        }
        if let Some(port) = get("RESTREAMER_PORT") {
            config.restreamer.port = parse_value("RESTREAMER_PORT", &port)?;
        }
        config.restreamer.username = get("RESTREAMER_USERNAME");
        config.restreamer.password = get("RESTREAMER_PASSWORD");
        if let Some(https) = get("RESTREAMER_HTTPS") {
            config.restreamer.use_https = parse_bool("RESTREAMER_HTTPS", &https)?;
        }
        if let Some(timeout) = get("RESTREAMER_TIMEOUT_SECS") {
            config.restreamer.timeout =
                Duration::from_secs(parse_value("RESTREAMER_TIMEOUT_SECS", &timeout)?);
        }

        if let Some(path) = get("POLYCAST_SETTINGS_PATH") {
            config.settings_path = PathBuf::from(path);
        }
        if let Some(addr) = get("API_BIND_ADDRESS") {
            config.api_bind_address = addr;
        }
        if let Some(port) = get("API_PORT") {
            config.api_port = parse_value("API_PORT", &port)?;
        }
        if let Some(tick) = get("SCHEDULER_TICK_SECS") {
            let secs: u64 = parse_value("SCHEDULER_TICK_SECS", &tick)?;
            if secs == 0 {
                return Err(Error::config("SCHEDULER_TICK_SECS must be at least 1"));
            }
            config.scheduler_tick = Duration::from_secs(secs);
        }
        config.log_dir = get("LOG_DIR").map(PathBuf::from);

        Ok(config)
    }

    /// Connection settings, or `None` when no Restreamer credentials are set.
    pub fn restreamer_connection(&self) -> Option<ConnectionConfig> {
        self.restreamer
            .username
            .as_ref()
            .map(|_| self.restreamer.clone())
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| Error::config(format!("Invalid value for {}: '{}'", key, raw)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("Invalid value for {}: '{}'", key, raw))),
    }
}
