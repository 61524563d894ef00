use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub backend: BackendConfig,
    pub retry: RetryConfig,
    pub image: ImageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Host serving `/api/chat`, `/api/products` and `/api/health`
    pub base_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// How many times a 503 "warming up" answer is retried within one send
    pub max_warmup_retries: u32,
    /// Used when the 503 carries no usable `Retry-After` header
    pub default_retry_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub max_dimension: u32,
    pub max_bytes: usize,
    pub initial_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            retry: RetryConfig::default(),
            image: ImageConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 120_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_warmup_retries: 1,
            default_retry_after_secs: 60,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            max_bytes: 400 * 1024,
            initial_quality: 90,
            quality_step: 10,
            min_quality: 30,
        }
    }
}

impl Settings {
    /// Built-in defaults, then `config/{CONFIG_ENV}.toml`, then `APP__*` variables.
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
