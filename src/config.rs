use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";

/// Shelf-life thresholds used by admission control and the near-expiry
/// report. Values are days-until-expiry; `critical` must not exceed
/// `warning`. Database settings override these at runtime.
pub const DEFAULT_EXPIRY_WARNING_DAYS: i64 = 180;
pub const DEFAULT_EXPIRY_CRITICAL_DAYS: i64 = 90;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Default days-until-expiry below which an incoming batch needs
    /// acknowledgement (yellow window)
    #[validate(range(min = 1))]
    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: i64,

    /// Default days-until-expiry below which an incoming batch needs a
    /// written override reason (red window)
    #[validate(range(min = 1))]
    #[serde(default = "default_expiry_critical_days")]
    pub expiry_critical_days: i64,

    /// Document number collision retries before giving up
    #[serde(default = "default_sequencer_retry_attempts")]
    pub sequencer_retry_attempts: u32,

    /// Pause between document number retries, in milliseconds
    #[serde(default = "default_sequencer_retry_backoff_ms")]
    pub sequencer_retry_backoff_ms: u64,
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_expiry_warning_days() -> i64 {
    DEFAULT_EXPIRY_WARNING_DAYS
}

fn default_expiry_critical_days() -> i64 {
    DEFAULT_EXPIRY_CRITICAL_DAYS
}

fn default_sequencer_retry_attempts() -> u32 {
    3
}

fn default_sequencer_retry_backoff_ms() -> u64 {
    50
}

impl AppConfig {
    /// Minimal constructor used by tests and embedded setups.
    pub fn new(database_url: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            expiry_warning_days: default_expiry_warning_days(),
            expiry_critical_days: default_expiry_critical_days(),
            sequencer_retry_attempts: default_sequencer_retry_attempts(),
            sequencer_retry_backoff_ms: default_sequencer_retry_backoff_ms(),
        }
    }

    /// Loads configuration from layered sources: `config/default`, then
    /// `config/{environment}`, then `APP__`-prefixed environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let mut builder = Config::builder();

        let default_path = Path::new(CONFIG_DIR).join("default");
        builder = builder.add_source(File::from(default_path).required(false));

        let env_path = Path::new(CONFIG_DIR).join(&environment);
        builder = builder.add_source(File::from(env_path).required(false));

        builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        config.validate_expiry_windows()?;

        info!(
            environment = %config.environment,
            "configuration loaded"
        );

        Ok(config)
    }

    /// The critical (red) window must sit inside the warning (yellow) window.
    pub fn validate_expiry_windows(&self) -> Result<(), ConfigError> {
        if self.expiry_critical_days > self.expiry_warning_days {
            return Err(ConfigError::Message(format!(
                "expiry_critical_days ({}) must not exceed expiry_warning_days ({})",
                self.expiry_critical_days, self.expiry_warning_days
            )));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
