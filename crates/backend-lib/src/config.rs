// ============================
// ems-backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Layers, later wins: built-in defaults, a TOML file, then `EMS_*`
//! environment variables with `__` separating nested keys
//! (`EMS_LOCKOUT__THRESHOLD=5`).
use crate::auth::LockoutPolicy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "EMS_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Longest accepted lock (1 day)
pub const MAX_LOCK_DURATION_SECS: u64 = 24 * 60 * 60;

/// Longest accepted session lifetime (1 year)
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load(Box::new(e))
    }
}

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub lockout: LockoutSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Frontend origin allowed to call the API with credentials
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Data directory of the flat-file account store
    pub path: PathBuf,
}

/// Account lockout policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutSettings {
    /// Consecutive failures that lock an account
    pub threshold: u32,
    /// How long a lock lasts
    pub duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_secs: u64,
    /// HMAC key for session tokens; an ephemeral key is generated when unset
    pub secret: Option<String>,
    pub cookie_name: String,
    /// Mark the cookie `Secure` (serve over HTTPS)
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origin: None,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
        }
    }
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            threshold: crate::auth::DEFAULT_LOCK_THRESHOLD,
            duration_secs: crate::auth::DEFAULT_LOCK_DURATION.as_secs(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: crate::auth::SESSION_TTL.as_secs(),
            secret: None,
            cookie_name: "token".to_string(),
            cookie_secure: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LockoutSettings {
    pub fn policy(&self) -> LockoutPolicy {
        LockoutPolicy::new(self.threshold, Duration::from_secs(self.duration_secs))
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Settings {
    /// Provider chain for a given config file
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from `config.toml` in the working directory plus the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file plus the environment. A missing file is not
    /// an error; the defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(path).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address: {e}")))
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lockout.threshold == 0 {
            return Err(ConfigError::Invalid(
                "lockout.threshold must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_LOCK_DURATION_SECS).contains(&self.lockout.duration_secs) {
            return Err(ConfigError::Invalid(format!(
                "lockout.duration_secs must be between 1 and {MAX_LOCK_DURATION_SECS}"
            )));
        }
        if !(1..=MAX_SESSION_TTL_SECS).contains(&self.session.ttl_secs) {
            return Err(ConfigError::Invalid(format!(
                "session.ttl_secs must be between 1 and {MAX_SESSION_TTL_SECS}"
            )));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        let cookie_name = &self.session.cookie_name;
        if cookie_name.is_empty()
            || !cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid(
                "session.cookie_name must be non-empty and contain only [A-Za-z0-9_-]".to_string(),
            ));
        }
        if let Some(secret) = &self.session.secret {
            if secret.len() < 32 {
                return Err(ConfigError::Invalid(
                    "session.secret must be at least 32 bytes".to_string(),
                ));
            }
        }
        if let Some(origin) = &self.server.cors_origin {
            if !(origin.starts_with("http://") || origin.starts_with("https://"))
                || origin.chars().any(|c| c.is_whitespace() || c.is_control())
            {
                return Err(ConfigError::Invalid(
                    "server.cors_origin must be an http(s) origin".to_string(),
                ));
            }
        }
        self.bind_addr()?;
        Ok(())
    }
}
