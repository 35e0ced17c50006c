//! In-memory reading store
//!
//! Keeps readings in key order, the same order a DynamoDB partition returns
//! them in. Used for unit tests and local runs; supports failure injection so
//! handler error paths can be exercised without a real table.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashSet},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{debug, trace};

use super::{ReadingStore, StoreStats};
use crate::error::{WeatherError, WeatherResult};
use crate::filter::ReadingFilter;
use crate::reading::{DeviceId, Reading};
use crate::time::Timestamp;

#[derive(Debug, Default)]
struct MemoryStorage {
    /// Stored readings keyed by (device_id, timestamp)
    readings: BTreeMap<(DeviceId, Timestamp), Reading>,
    /// Every reading accepted by a write call, in call order
    write_log: Vec<Reading>,
    /// Track operations for testing
    operations: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryStoreStats {
    write_calls: AtomicU64,
    failed_writes: AtomicU64,
    readings_written: AtomicU64,
    queries: AtomicU64,
    failed_queries: AtomicU64,
}

/// In-memory store with failure injection
#[derive(Debug)]
pub struct MemoryReadingStore {
    storage: Mutex<MemoryStorage>,
    stats: MemoryStoreStats,
    simulate_errors: bool,
    failing_timestamps: Mutex<HashSet<Timestamp>>,
    transient_write_failures: AtomicU64,
    max_batch_size: usize,
}

impl MemoryReadingStore {
    /// Create an empty store
    pub fn new() -> Self {
        debug!("Creating in-memory reading store");

        Self {
            storage: Mutex::new(MemoryStorage::default()),
            stats: MemoryStoreStats::default(),
            simulate_errors: false,
            failing_timestamps: Mutex::new(HashSet::new()),
            transient_write_failures: AtomicU64::new(0),
            max_batch_size: 25,
        }
    }

    /// Fail every call
    pub fn with_error_simulation(mut self) -> Self {
        self.simulate_errors = true;
        self
    }

    /// Override the group size accepted by `put_readings`
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Fail any write that touches `timestamp`
    pub fn fail_writes_at(&self, timestamp: i64) {
        self.failing_timestamps
            .lock()
            .insert(Timestamp::from_secs(timestamp));
    }

    /// Fail the next `count` write calls, then recover
    pub fn fail_next_writes(&self, count: u64) {
        self.transient_write_failures.store(count, Ordering::SeqCst);
    }

    /// Seed a reading without counting it as a write
    pub fn insert(&self, reading: Reading) {
        let mut storage = self.storage.lock();
        storage
            .readings
            .insert((reading.device_id.clone(), reading.timestamp), reading);
    }

    /// Number of distinct stored readings
    pub fn len(&self) -> usize {
        self.storage.lock().readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Readings accepted by write calls, in the order they were written
    pub fn write_log(&self) -> Vec<Reading> {
        self.storage.lock().write_log.clone()
    }

    /// Get the operation log
    pub fn operations(&self) -> Vec<String> {
        self.storage.lock().operations.clone()
    }

    /// Look up one reading by key
    pub fn get(&self, device_id: &str, timestamp: i64) -> Option<Reading> {
        let device_id = DeviceId::new(device_id).ok()?;
        self.storage
            .lock()
            .readings
            .get(&(device_id, Timestamp::from_secs(timestamp)))
            .cloned()
    }

    fn check_write(&self, readings: &[Reading]) -> WeatherResult<()> {
        if self.simulate_errors {
            return Err(WeatherError::store("Simulated write error"));
        }

        let consumed = self
            .transient_write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(WeatherError::store("Simulated transient write error"));
        }

        let failing = self.failing_timestamps.lock();
        if let Some(reading) = readings.iter().find(|r| failing.contains(&r.timestamp)) {
            return Err(WeatherError::store(format!(
                "Simulated write error at timestamp {}",
                reading.timestamp
            )));
        }

        Ok(())
    }

    fn write(&self, operation: String, readings: &[Reading]) -> WeatherResult<()> {
        self.stats.write_calls.fetch_add(1, Ordering::Relaxed);

        if let Err(err) = self.check_write(readings) {
            self.stats.failed_writes.fetch_add(1, Ordering::Relaxed);
            self.storage.lock().operations.push(format!("{} failed", operation));
            return Err(err);
        }

        let mut storage = self.storage.lock();
        storage.operations.push(operation);
        for reading in readings {
            storage.write_log.push(reading.clone());
            storage
                .readings
                .insert((reading.device_id.clone(), reading.timestamp), reading.clone());
        }

        self.stats
            .readings_written
            .fetch_add(readings.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

impl Default for MemoryReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn put_reading(&self, reading: &Reading) -> WeatherResult<()> {
        trace!(
            "Memory: put_reading({}, {})",
            reading.device_id,
            reading.timestamp
        );
        self.write(
            format!("put_reading({}, {})", reading.device_id, reading.timestamp),
            std::slice::from_ref(reading),
        )
    }

    async fn put_readings(&self, readings: &[Reading]) -> WeatherResult<()> {
        if readings.is_empty() {
            return Ok(());
        }

        if readings.len() > self.max_batch_size {
            return Err(WeatherError::store(format!(
                "Batch of {} exceeds limit of {}",
                readings.len(),
                self.max_batch_size
            )));
        }

        trace!("Memory: put_readings({} readings)", readings.len());
        self.write(format!("put_readings({})", readings.len()), readings)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn query_readings(&self, filter: &ReadingFilter) -> WeatherResult<Vec<Reading>> {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);

        if self.simulate_errors {
            self.stats.failed_queries.fetch_add(1, Ordering::Relaxed);
            return Err(WeatherError::store("Simulated query error"));
        }

        let mut storage = self.storage.lock();
        storage.operations.push(format!("query({})", filter));

        let matches: Vec<Reading> = storage
            .readings
            .values()
            .filter(|reading| filter.matches(reading))
            .cloned()
            .collect();

        debug!("Memory: query '{}' matched {} readings", filter, matches.len());
        Ok(matches)
    }

    fn get_stats(&self) -> StoreStats {
        StoreStats {
            write_calls: self.stats.write_calls.load(Ordering::Relaxed),
            failed_writes: self.stats.failed_writes.load(Ordering::Relaxed),
            readings_written: self.stats.readings_written.load(Ordering::Relaxed),
            queries: self.stats.queries.load(Ordering::Relaxed),
            failed_queries: self.stats.failed_queries.load(Ordering::Relaxed),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
