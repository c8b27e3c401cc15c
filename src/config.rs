use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "config/local";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BeaconConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub max_concurrent_probes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_probes: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub acquire_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout", with = "humantime_duration")]
    pub timeout: Duration,
    #[serde(default = "default_slow_threshold", with = "humantime_duration")]
    pub slow_threshold: Duration,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: default_probe_timeout(),
            slow_threshold: default_slow_threshold(),
            scheme: default_scheme(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default)]
    pub cron_secret: Option<String>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            cron_secret: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook_urls: Vec<String>,
    #[serde(default = "default_webhook_timeout", with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_urls: Vec::new(),
            timeout: default_webhook_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_slow_threshold() -> Duration {
    Duration::from_secs(1)
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_user_agent() -> String {
    concat!("beacon/", env!("CARGO_PKG_VERSION")).to_string()
}

const fn default_horizon_days() -> u32 {
    crate::sweep::DEFAULT_RETENTION_DAYS
}

const fn default_webhook_timeout() -> Duration {
    Duration::from_secs(5)
}

impl BeaconConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Layers `BEACON__*` environment variables over the given file, or over
    /// `config/local` when no path is supplied.
    pub fn load_from(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("BEACON")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("notifications.webhook_urls")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Cron secret compared as written; whitespace-only values count as unset.
    pub fn cron_secret(&self) -> Option<&str> {
        self.retention
            .cron_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
    }
}

/// Accepts either a humantime string (`"1500ms"`, `"10s"`) or a bare number of milliseconds.
mod humantime_duration {
    use serde::{de, Deserialize, Deserializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(u64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => humantime::parse_duration(text.trim()).map_err(de::Error::custom),
            Raw::Millis(millis) => Ok(Duration::from_millis(millis)),
        }
    }
}
