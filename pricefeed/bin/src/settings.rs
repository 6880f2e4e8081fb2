use config::{Config, ConfigError, Environment, File};
use pricefeed_domain::Provider;
use pricefeed_infrastructure::gateways::default_providers;
use pricefeed_infrastructure::redis_connection::default_redis_url;
use pricefeed_infrastructure::{KafkaSettings, RateLimitTable};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/pricefeed";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub kafka: KafkaSettings,
    pub redis: RedisSettings,
    /// Minimum seconds between two calls to a provider.
    pub rate_limits: HashMap<Provider, u64>,
    pub simulator: SimulatorSettings,
    pub shutdown: ShutdownSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub providers: Vec<Provider>,
    pub base_price: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            base_price: 100.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownSettings {
    pub flush_timeout_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            flush_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Layers the optional TOML file under `PRICEFEED_*` environment variables
    /// (`__` separates nested keys, e.g. `PRICEFEED_KAFKA__BOOTSTRAP_SERVERS`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("PRICEFEED")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn rate_limit_table(&self) -> RateLimitTable {
        self.rate_limits
            .iter()
            .fold(RateLimitTable::default(), |table, (provider, secs)| {
                table.with_interval(*provider, Duration::from_secs(*secs))
            })
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown.flush_timeout_secs)
    }
}
