//! Configuration loading and representation.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! then `WARDEN__SECTION__KEY` environment variables (a `.env` file is read
//! into the process environment first).

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use warden_auth::{MAX_TTL_HOURS, TokenConfig};

pub use warden_observability::LogFormat;

pub const ENV_PREFIX: &str = "WARDEN";

/// Env var naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "WARDEN_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "config/warden.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL. Absent means the in-memory store (dev only).
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    pub issuer: String,
    pub token_ttl_hours: i64,
    pub validator: ValidatorConfig,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("validator", &self.validator)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    pub mode: ValidatorMode,
    #[serde(default)]
    pub remote_url: Option<String>,
    pub timeout_ms: u64,
}

/// Where the gateway sends bearer tokens for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorMode {
    /// Verify signatures in-process with the shared secret.
    Local,
    /// Delegate to a trusted issuer's `/auth/validate`.
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl AppConfig {
    /// Load from `.env`, the config file (if any), and `WARDEN__*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("ignoring unreadable .env file: {e}");
            }
        }

        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self::from_sources(Some(&path), Self::environment())
    }

    /// `WARDEN__AUTH__JWT_SECRET` → `auth.jwt_secret`, with scalar parsing.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    /// Build from explicit sources. A missing file is not an error.
    pub fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("auth.issuer", warden_auth::DEFAULT_ISSUER)?
            .set_default("auth.token_ttl_hours", warden_auth::DEFAULT_TTL_HOURS)?
            .set_default("auth.validator.mode", "local")?
            .set_default("auth.validator.timeout_ms", 2000)?
            .set_default("logging.format", "json")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let cfg: Self = builder.add_source(env).build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must be set".into()));
        }
        if !(1..=MAX_TTL_HOURS).contains(&self.auth.token_ttl_hours) {
            return Err(ConfigError::Invalid(format!(
                "auth.token_ttl_hours must be between 1 and {MAX_TTL_HOURS}"
            )));
        }
        if self.auth.validator.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "auth.validator.timeout_ms must be positive".into(),
            ));
        }
        if self.auth.validator.mode == ValidatorMode::Remote
            && self.auth.validator.remote_url.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::Invalid(
                "auth.validator.remote_url is required in remote mode".into(),
            ));
        }
        Ok(())
    }

    pub fn token_config(&self) -> Result<TokenConfig, ConfigError> {
        let ttl = chrono::Duration::try_hours(self.auth.token_ttl_hours).ok_or_else(|| {
            ConfigError::Invalid("auth.token_ttl_hours out of range".into())
        })?;
        Ok(TokenConfig::new(self.auth.jwt_secret.clone())
            .with_issuer(self.auth.issuer.clone())
            .with_ttl(ttl))
    }

    pub fn validator_timeout(&self) -> Duration {
        Duration::from_millis(self.auth.validator.timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
