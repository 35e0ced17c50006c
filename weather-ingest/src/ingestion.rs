//! Ingestion service
//!
//! Writes a parsed batch to the store in index order, one record per call by
//! default or in store-sized groups when batched writes are enabled. A failed
//! write is handled by the configured [`FailurePolicy`]; earlier writes are
//! never rolled back.

use serde::{Deserialize, Serialize};
use std::{
    ops::Range,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};
use tracing::{debug, error, info, warn};
use weather_core::{BoxedReadingStore, Reading, WeatherError, WeatherResult};

use crate::{
    config::{FailurePolicy, IngestConfig, WriteMode},
    event::{EventParser, IngestEvent},
};

/// Counters kept for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct IngestionMetrics {
    /// Samples written successfully
    pub samples_written: Arc<AtomicU64>,
    /// Events processed to completion
    pub batches_processed: Arc<AtomicU64>,
    /// Store writes that failed after any retries
    pub write_failures: Arc<AtomicU64>,
    /// Events rejected before writing
    pub validation_errors: Arc<AtomicU64>,
}

/// Point-in-time copy of [`IngestionMetrics`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub samples_written: u64,
    pub batches_processed: u64,
    pub write_failures: u64,
    pub validation_errors: u64,
}

/// Outcome of one ingest event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Samples requested by `count`
    pub requested: usize,
    /// Samples written
    pub written: usize,
    /// Indices that could not be written (skip policy only)
    pub failed_indices: Vec<usize>,
}

/// Ingest handler core
pub struct IngestionService {
    config: Arc<IngestConfig>,
    store: BoxedReadingStore,
    parser: EventParser,
    metrics: IngestionMetrics,
}

impl IngestionService {
    /// Create a new ingestion service
    pub fn new(config: Arc<IngestConfig>, store: BoxedReadingStore) -> anyhow::Result<Self> {
        config.validate()?;

        info!(
            "Ingestion service using {} store, write mode {:?}, failure policy {:?}",
            store.backend_name(),
            config.ingestion.write_mode,
            config.ingestion.failure_policy
        );

        Ok(Self {
            parser: EventParser::new(config.ingestion.max_batch_size),
            config,
            store,
            metrics: IngestionMetrics::default(),
        })
    }

    /// Validate an event and write its samples
    pub async fn ingest(&self, event: &IngestEvent) -> WeatherResult<IngestReport> {
        let start_time = Instant::now();

        let readings = self.parser.parse(event).map_err(|err| {
            self.metrics.validation_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Rejected ingest event: {}", err);
            err
        })?;

        let group_size = match self.config.ingestion.write_mode {
            WriteMode::PerRecord => 1,
            WriteMode::Batched => self.store.max_batch_size().max(1),
        };

        let mut report = IngestReport {
            requested: readings.len(),
            written: 0,
            failed_indices: Vec::new(),
        };

        let mut start = 0;
        while start < readings.len() {
            let range = start..(start + group_size).min(readings.len());
            start = range.end;

            match self.write_with_retry(&readings[range.clone()]).await {
                Ok(()) => {
                    report.written += range.len();
                    self.metrics
                        .samples_written
                        .fetch_add(range.len() as u64, Ordering::Relaxed);
                }
                Err(err) => {
                    self.metrics.write_failures.fetch_add(1, Ordering::Relaxed);
                    match self.config.ingestion.failure_policy {
                        FailurePolicy::Skip => {
                            warn!("Skipping samples {:?} after write failure: {}", range, err);
                            report.failed_indices.extend(range);
                        }
                        FailurePolicy::Halt | FailurePolicy::Retry => {
                            error!(
                                "Write failed at samples {:?}; {} of {} samples already written",
                                range, report.written, report.requested
                            );
                            return Err(halted(err, &range, &report));
                        }
                    }
                }
            }
        }

        self.metrics.batches_processed.fetch_add(1, Ordering::Relaxed);
        info!(
            "Ingested {}/{} samples in {:?}",
            report.written,
            report.requested,
            start_time.elapsed()
        );
        Ok(report)
    }

    async fn write_with_retry(&self, readings: &[Reading]) -> WeatherResult<()> {
        let attempts = match self.config.ingestion.failure_policy {
            FailurePolicy::Retry => self.config.ingestion.retry_attempts.max(1),
            FailurePolicy::Halt | FailurePolicy::Skip => 1,
        };

        let mut attempt = 1;
        loop {
            match self.write(readings).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retriable() && attempt < attempts => {
                    debug!("Write attempt {}/{} failed: {}", attempt, attempts, err);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn write(&self, readings: &[Reading]) -> WeatherResult<()> {
        match readings {
            [reading] if self.config.ingestion.write_mode == WriteMode::PerRecord => {
                self.store.put_reading(reading).await
            }
            _ => self.store.put_readings(readings).await,
        }
    }

    /// Get a copy of the service counters
    pub fn get_metrics_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_written: self.metrics.samples_written.load(Ordering::Relaxed),
            batches_processed: self.metrics.batches_processed.load(Ordering::Relaxed),
            write_failures: self.metrics.write_failures.load(Ordering::Relaxed),
            validation_errors: self.metrics.validation_errors.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self) -> &BoxedReadingStore {
        &self.store
    }
}

/// Attach batch position to a store error
fn halted(err: WeatherError, range: &Range<usize>, report: &IngestReport) -> WeatherError {
    match err {
        WeatherError::Store(message) => WeatherError::store(format!(
            "write of samples {}..{} failed after {} of {} samples were written: {}",
            range.start, range.end, report.written, report.requested, message
        )),
        other => other,
    }
}
