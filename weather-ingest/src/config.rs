use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use weather_core::StoreConfig;

/// How samples of a batch are handed to the store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// One store write per sample, in index order
    PerRecord,
    /// Store-sized groups through the batch write call, in index order
    Batched,
}

/// What to do when a store write fails mid-batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the failing write and propagate the error
    Halt,
    /// Record the failing samples and carry on with the rest
    Skip,
    /// Retry the failing write, then halt if it still fails
    Retry,
}

/// Configuration for the ingest handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Store connection configuration
    pub store: StoreConfig,

    /// Ingestion limits and settings
    pub ingestion: IngestionConfig,
}

/// Ingestion-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Maximum number of samples per event
    pub max_batch_size: usize,

    /// Per-record or batched store writes
    pub write_mode: WriteMode,

    /// Mid-batch failure handling
    pub failure_policy: FailurePolicy,

    /// Total attempts per write under the retry policy
    pub retry_attempts: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            ingestion: IngestionConfig::default(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_batch_size: weather_core::MAX_BATCH_SIZE,
            write_mode: WriteMode::PerRecord,
            failure_policy: FailurePolicy::Halt,
            retry_attempts: 3,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables and defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        config
            .store
            .apply_env()
            .context("Invalid store configuration")?;

        if let Ok(max_batch_size) = env::var("WEATHER_INGEST_MAX_BATCH_SIZE") {
            config.ingestion.max_batch_size = max_batch_size
                .parse()
                .context("WEATHER_INGEST_MAX_BATCH_SIZE must be an integer")?;
        }

        if let Ok(write_mode) = env::var("WEATHER_INGEST_WRITE_MODE") {
            config.ingestion.write_mode = parse_write_mode(&write_mode)?;
        }

        if let Ok(policy) = env::var("WEATHER_INGEST_FAILURE_POLICY") {
            config.ingestion.failure_policy = parse_failure_policy(&policy)?;
        }

        if let Ok(attempts) = env::var("WEATHER_INGEST_RETRY_ATTEMPTS") {
            config.ingestion.retry_attempts = attempts
                .parse()
                .context("WEATHER_INGEST_RETRY_ATTEMPTS must be an integer")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;

        if self.ingestion.max_batch_size == 0 {
            return Err(anyhow::anyhow!("Max batch size must be greater than 0"));
        }

        if self.ingestion.failure_policy == FailurePolicy::Retry
            && self.ingestion.retry_attempts == 0
        {
            return Err(anyhow::anyhow!(
                "Retry attempts must be greater than 0 for the retry policy"
            ));
        }

        Ok(())
    }
}

fn parse_write_mode(value: &str) -> Result<WriteMode> {
    match value.trim().to_lowercase().as_str() {
        "per_record" => Ok(WriteMode::PerRecord),
        "batched" => Ok(WriteMode::Batched),
        other => Err(anyhow::anyhow!(
            "Invalid write mode: {}. Valid options: per_record, batched",
            other
        )),
    }
}

fn parse_failure_policy(value: &str) -> Result<FailurePolicy> {
    match value.trim().to_lowercase().as_str() {
        "halt" => Ok(FailurePolicy::Halt),
        "skip" => Ok(FailurePolicy::Skip),
        "retry" => Ok(FailurePolicy::Retry),
        other => Err(anyhow::anyhow!(
            "Invalid failure policy: {}. Valid options: halt, skip, retry",
            other
        )),
    }
}
