//! Service settings.
//!
//! Built-in defaults, then an optional file (`deathcast.toml`, `.yaml`, ...),
//! then `DEATHCAST__SECTION__KEY` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "deathcast";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub upstream: UpstreamSettings,
    pub log: LogSettings,
}
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    /// 0 picks a free port.
    pub port: u16,
}
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UpstreamSettings {
    /// Base url of the prediction producer and verification oracle. Without
    /// one, the in-memory upstream is used.
    #[serde(default)]
    pub url: Option<String>,
    pub timeout_ms: u64,
}
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8081)?
            .set_default("database.url", "sqlite::memory:")?
            .set_default("database.max_connections", 5)?
            .set_default("upstream.timeout_ms", 5000)?
            .set_default("log.level", "debug")?
            .add_source(file)
            .add_source(Environment::with_prefix("DEATHCAST").separator("__"))
            .build()
            .context("Failed to build configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
impl UpstreamSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.upstream.url, None);
        assert_eq!(settings.upstream.timeout(), Duration::from_secs(5));
    }
    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("deathcast-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[upstream]\nurl = \"http://127.0.0.1:7000\"\ntimeout_ms = 250\n",
        )
        .unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.upstream.url.as_deref(), Some("http://127.0.0.1:7000"));
        assert_eq!(settings.upstream.timeout(), Duration::from_millis(250));
        assert_eq!(settings.log.level, "debug");
    }
    #[test]
    fn missing_explicit_file_is_an_error() {
        Settings::load(Some(Path::new("/nonexistent/deathcast.toml"))).unwrap_err();
    }
}
