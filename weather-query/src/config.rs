use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use weather_core::{DeviceId, StoreConfig};

/// Configuration for the query handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Store connection configuration
    pub store: StoreConfig,

    /// Query defaults
    pub query: QueryDefaultsConfig,

    /// Response settings
    pub response: ResponseConfig,
}

/// Defaults applied when a request leaves something out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefaultsConfig {
    /// Device queried when the request has no `device_id`
    pub default_device_id: String,

    /// Width of the implicit window used when no bound is given
    pub default_window_secs: i64,
}

/// Response envelope settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Value for `Access-Control-Allow-Origin`, omitted when unset
    pub cors_allow_origin: Option<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            query: QueryDefaultsConfig::default(),
            response: ResponseConfig::default(),
        }
    }
}

impl Default for QueryDefaultsConfig {
    fn default() -> Self {
        Self {
            default_device_id: weather_core::DEFAULT_DEVICE_ID.to_string(),
            default_window_secs: weather_core::DEFAULT_WINDOW_SECS,
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            cors_allow_origin: None,
        }
    }
}

impl QueryConfig {
    /// Load configuration from environment variables and defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        config
            .store
            .apply_env()
            .context("Invalid store configuration")?;

        if let Ok(device_id) = env::var("WEATHER_DEFAULT_DEVICE_ID") {
            config.query.default_device_id = device_id;
        }

        if let Ok(window) = env::var("WEATHER_DEFAULT_WINDOW_SECS") {
            config.query.default_window_secs = window
                .parse()
                .context("WEATHER_DEFAULT_WINDOW_SECS must be an integer")?;
        }

        if let Ok(origin) = env::var("WEATHER_CORS_ALLOW_ORIGIN") {
            config.response.cors_allow_origin = Some(origin);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;

        DeviceId::new(self.query.default_device_id.clone())
            .context("Invalid default device id")?;

        if self.query.default_window_secs <= 0 {
            return Err(anyhow::anyhow!("Default window must be positive"));
        }

        Ok(())
    }
}
