//! Data store abstraction for sensor readings
//!
//! Handlers depend only on [`ReadingStore`]: single-record upsert by full key,
//! a batched upsert, and a filtered scan. Table administration (creation,
//! indexes, throughput) is out of reach of this trait.

pub mod dynamodb;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{env, sync::Arc};
use tracing::info;

use crate::error::{WeatherError, WeatherResult};
use crate::filter::ReadingFilter;
use crate::reading::Reading;

pub use dynamodb::DynamoReadingStore;
pub use memory::MemoryReadingStore;

/// Storage backend for sensor readings.
///
/// Implementations must be safe to share between concurrent invocations.
/// A write of an existing (device_id, timestamp) key replaces the record.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Upsert one reading keyed by (device_id, timestamp)
    async fn put_reading(&self, reading: &Reading) -> WeatherResult<()>;

    /// Upsert a group of readings.
    ///
    /// `readings` never exceeds [`ReadingStore::max_batch_size`]. The default
    /// writes one record at a time and stops at the first failure.
    async fn put_readings(&self, readings: &[Reading]) -> WeatherResult<()> {
        for reading in readings {
            self.put_reading(reading).await?;
        }
        Ok(())
    }

    /// Largest group accepted by a single `put_readings` call
    fn max_batch_size(&self) -> usize {
        25
    }

    /// Return every reading matching `filter`, in the store's natural order
    async fn query_readings(&self, filter: &ReadingFilter) -> WeatherResult<Vec<Reading>>;

    /// Get store statistics
    fn get_stats(&self) -> StoreStats;

    /// Short backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Type alias for a shared store trait object
pub type BoxedReadingStore = Arc<dyn ReadingStore>;

/// Statistics for store operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Write calls issued (single or batched)
    pub write_calls: u64,
    /// Write calls that failed
    pub failed_writes: u64,
    /// Readings written successfully
    pub readings_written: u64,
    /// Query calls issued
    pub queries: u64,
    /// Query calls that failed
    pub failed_queries: u64,
}

/// Which store implementation to connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Dynamodb,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dynamodb" => Ok(StoreBackend::Dynamodb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(WeatherError::configuration(format!(
                "Invalid store backend: {}. Valid options: dynamodb, memory",
                other
            ))),
        }
    }
}

/// Store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend implementation
    pub backend: StoreBackend,

    /// Table holding the readings
    pub table_name: String,

    /// Endpoint override, e.g. a local DynamoDB
    pub endpoint_url: Option<String>,

    /// Region override; the SDK default chain applies when unset
    pub region: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Dynamodb,
            table_name: crate::DEFAULT_TABLE_NAME.to_string(),
            endpoint_url: None,
            region: None,
        }
    }
}

impl StoreConfig {
    /// Apply `WEATHER_STORE_*` / `WEATHER_TABLE_NAME` environment overrides
    pub fn apply_env(&mut self) -> WeatherResult<()> {
        if let Ok(backend) = env::var("WEATHER_STORE_BACKEND") {
            self.backend = backend.parse()?;
        }

        if let Ok(table_name) = env::var("WEATHER_TABLE_NAME") {
            self.table_name = table_name;
        }

        if let Ok(endpoint) = env::var("WEATHER_STORE_ENDPOINT_URL") {
            self.endpoint_url = Some(endpoint);
        }

        if let Ok(region) = env::var("WEATHER_STORE_REGION") {
            self.region = Some(region);
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> WeatherResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(WeatherError::configuration("Table name cannot be empty"));
        }

        if let Some(endpoint) = &self.endpoint_url {
            if endpoint.trim().is_empty() {
                return Err(WeatherError::configuration(
                    "Store endpoint URL cannot be empty when set",
                ));
            }
        }

        Ok(())
    }
}

/// Open the configured store.
///
/// Called once per process; the handle is shared by every invocation.
pub async fn connect(config: &StoreConfig) -> WeatherResult<BoxedReadingStore> {
    config.validate()?;

    let store: BoxedReadingStore = match config.backend {
        StoreBackend::Dynamodb => Arc::new(DynamoReadingStore::connect(config).await),
        StoreBackend::Memory => Arc::new(MemoryReadingStore::new()),
    };

    info!(
        "Connected {} store for table '{}'",
        store.backend_name(),
        config.table_name
    );
    Ok(store)
}
