use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aquatrace_core::{Farm, FarmId, ThresholdSet};
use serde::Deserialize;
use thiserror::Error;
use ulid::Ulid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub alerts: AlertConfig,
    pub farms: Vec<FarmConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SourceConfig {
    #[default]
    Simulation,
    Hardware {
        channel: ChannelConfig,
        #[serde(default = "default_read_timeout_ms")]
        read_timeout_ms: u64,
        #[serde(default = "default_settle_ms")]
        settle_ms: u64,
    },
}

fn default_read_timeout_ms() -> u64 {
    1500
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_baud_rate() -> u32 {
    crate::source::live::DEFAULT_BAUD_RATE
}

impl SourceConfig {
    pub fn read_timeout(&self) -> Duration {
        match self {
            SourceConfig::Hardware {
                read_timeout_ms, ..
            } => Duration::from_millis(*read_timeout_ms),
            SourceConfig::Simulation => Duration::from_millis(default_read_timeout_ms()),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        match self {
            SourceConfig::Hardware { settle_ms, .. } => Duration::from_millis(*settle_ms),
            SourceConfig::Simulation => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelConfig {
    Serial {
        path: PathBuf,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    Tcp { addr: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    Sqlite {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub cooldown_secs: u64,
    /// Sender number, in E.164 format.
    pub from: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_base: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            from: "+1234567890".to_string(),
            account_sid: None,
            auth_token: None,
            api_base: "https://api.twilio.com".to_string(),
        }
    }
}

impl AlertConfig {
    /// Fills missing credentials from `TWILIO_ACCOUNT_SID`,
    /// `TWILIO_AUTH_TOKEN` and `TWILIO_PHONE_FROM`.
    pub fn with_env_fallback(mut self) -> Self {
        if self.account_sid.is_none() {
            self.account_sid = std::env::var("TWILIO_ACCOUNT_SID").ok();
        }
        if self.auth_token.is_none() {
            self.auth_token = std::env::var("TWILIO_AUTH_TOKEN").ok();
        }
        if let Ok(from) = std::env::var("TWILIO_PHONE_FROM")
            && !from.trim().is_empty()
        {
            self.from = from;
        }
        self
    }

    pub fn cooldown(&self) -> jiff::SignedDuration {
        jiff::SignedDuration::from_secs(self.cooldown_secs as i64)
    }
}

/// A farm registered at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct FarmConfig {
    pub id: Ulid,
    pub name: String,
    pub owner_phone: Option<String>,
    pub species: Option<String>,
    pub location: Option<String>,
    pub pond_size_m3: Option<f64>,
    #[serde(default)]
    pub thresholds: ThresholdSet,
}

impl FarmConfig {
    pub fn to_farm(&self) -> Farm {
        Farm {
            id: FarmId(self.id),
            name: self.name.as_str().into(),
            owner_phone: self.owner_phone.as_deref().map(Into::into),
            species: self.species.as_deref().map(Into::into),
            location: self.location.as_deref().map(Into::into),
            pond_size_m3: self.pond_size_m3,
            thresholds: self.thresholds,
            created_at: jiff::Timestamp::now(),
        }
    }
}
