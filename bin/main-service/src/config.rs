//! Process configuration: optional YAML file, then environment overrides

use registry_core::{Endpoint, ServiceRole, DEFAULT_FULL_TTL};
use serde::Deserialize;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "MAIN_SERVICE_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value {value:?} for {var}")]
    InvalidValue { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// A backend known up front, registered through the first-contact path
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StaticBackend {
    pub service_id: String,
    #[serde(flatten)]
    pub endpoint: Endpoint,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Identity announced to peers
    pub service_id: String,
    /// Address of the status HTTP listener
    pub status_listen: SocketAddr,
    /// Address peers use to reach this registry
    pub advertise_ip: String,
    pub advertise_port: u16,
    pub sweep_period_ms: u64,
    pub full_ttl: u32,
    pub announce_min_ticks: u32,
    pub announce_max_ticks: u32,
    pub probe_timeout_ms: u64,
    pub log_format: LogFormat,
    pub static_backends: Vec<StaticBackend>,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            service_id: uuid::Uuid::new_v4().to_string(),
            status_listen: SocketAddr::from(([0, 0, 0, 0], 9090)),
            advertise_ip: "127.0.0.1".to_string(),
            advertise_port: 9090,
            sweep_period_ms: 1000,
            full_ttl: DEFAULT_FULL_TTL,
            announce_min_ticks: 5,
            announce_max_ticks: 8,
            probe_timeout_ms: 2000,
            log_format: LogFormat::Text,
            static_backends: Vec::new(),
        }
    }
}

impl MainConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve environment variables
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(&format!("{}CONFIG", ENV_PREFIX)) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(&format!("{}ID", ENV_PREFIX)) {
            self.service_id = id;
        }
        if let Some(ip) = lookup(&format!("{}ADVERTISE_IP", ENV_PREFIX)) {
            self.advertise_ip = ip;
        }
        override_parsed(lookup, "STATUS_LISTEN", &mut self.status_listen)?;
        override_parsed(lookup, "ADVERTISE_PORT", &mut self.advertise_port)?;
        override_parsed(lookup, "SWEEP_PERIOD_MS", &mut self.sweep_period_ms)?;
        override_parsed(lookup, "FULL_TTL", &mut self.full_ttl)?;
        override_parsed(lookup, "ANNOUNCE_MIN_TICKS", &mut self.announce_min_ticks)?;
        override_parsed(lookup, "ANNOUNCE_MAX_TICKS", &mut self.announce_max_ticks)?;
        override_parsed(lookup, "PROBE_TIMEOUT_MS", &mut self.probe_timeout_ms)?;
        override_parsed(lookup, "LOG_FORMAT", &mut self.log_format)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.full_ttl == 0 {
            return Err(ConfigError::Invalid("full_ttl must be at least 1".into()));
        }
        if self.sweep_period_ms == 0 {
            return Err(ConfigError::Invalid("sweep_period_ms must be positive".into()));
        }
        if self.announce_min_ticks == 0 || self.announce_min_ticks > self.announce_max_ticks {
            return Err(ConfigError::Invalid(format!(
                "announce ticks {}..={} is not a valid range",
                self.announce_min_ticks, self.announce_max_ticks
            )));
        }
        if self.service_id.is_empty() {
            return Err(ConfigError::Invalid("service_id must not be empty".into()));
        }
        Ok(())
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn announce_ticks(&self) -> RangeInclusive<u32> {
        self.announce_min_ticks..=self.announce_max_ticks
    }

    /// Handle other registries use to reach this one
    pub fn advertised_endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.advertise_ip.clone(),
            self.advertise_port,
            vec![ServiceRole::Main],
        )
    }
}

fn override_parsed<F, T>(lookup: &F, name: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let var = format!("{}{}", ENV_PREFIX, name);
    if let Some(value) = lookup(&var) {
        *slot = value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value })?;
    }
    Ok(())
}
