//! DynamoDB reading store
//!
//! Table layout: partition key `DeviceId` (S), sort key `Timestamp` (N),
//! with `Temperature` and `Humidity` stored as N attributes. DynamoDB
//! normalizes N values (`20.00` reads back as `20`), so the exact text is
//! also kept in `TemperatureText` / `HumidityText` (S) and preferred on read.

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    config::Region,
    error::DisplayErrorContext,
    types::{AttributeValue, PutRequest, WriteRequest},
    Client,
};
use rust_decimal::Decimal;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{debug, info, trace, warn};

use super::{ReadingStore, StoreConfig, StoreStats};
use crate::error::{WeatherError, WeatherResult};
use crate::filter::{attributes, PartiqlParam, ReadingFilter};
use crate::reading::{parse_decimal_str, DeviceId, Reading};
use crate::time::Timestamp;

/// BatchWriteItem accepts at most 25 put requests
const DYNAMODB_BATCH_LIMIT: usize = 25;

/// Attempts at resending unprocessed batch items before giving up
const UNPROCESSED_RETRY_LIMIT: usize = 3;

type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Default)]
struct DynamoStats {
    write_calls: AtomicU64,
    failed_writes: AtomicU64,
    readings_written: AtomicU64,
    queries: AtomicU64,
    failed_queries: AtomicU64,
}

/// Reading store backed by a DynamoDB table
pub struct DynamoReadingStore {
    client: Client,
    table_name: String,
    stats: DynamoStats,
}

impl DynamoReadingStore {
    /// Build a client from the SDK default chain plus config overrides
    pub async fn connect(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let Some(endpoint) = &config.endpoint_url {
            info!("Using DynamoDB endpoint override {}", endpoint);
            loader = loader.endpoint_url(endpoint.clone());
        }

        let sdk_config = loader.load().await;
        Self::from_client(Client::new(&sdk_config), config.table_name.clone())
    }

    /// Wrap an existing client
    pub fn from_client(client: Client, table_name: String) -> Self {
        Self {
            client,
            table_name,
            stats: DynamoStats::default(),
        }
    }

    async fn write_batch(&self, readings: &[Reading]) -> WeatherResult<()> {
        let mut pending = readings
            .iter()
            .map(|reading| {
                let put = PutRequest::builder()
                    .set_item(Some(reading_to_item(reading)))
                    .build()
                    .map_err(|e| WeatherError::store(format!("Invalid put request: {}", e)))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<WeatherResult<Vec<WriteRequest>>>()?;

        for attempt in 0..=UNPROCESSED_RETRY_LIMIT {
            let output = self
                .client
                .batch_write_item()
                .request_items(self.table_name.clone(), pending)
                .send()
                .await
                .map_err(|e| {
                    WeatherError::store(format!(
                        "BatchWriteItem on '{}' failed: {}",
                        self.table_name,
                        DisplayErrorContext(&e)
                    ))
                })?;

            pending = output
                .unprocessed_items()
                .and_then(|items| items.get(&self.table_name))
                .cloned()
                .unwrap_or_default();

            if pending.is_empty() {
                return Ok(());
            }

            warn!(
                "BatchWriteItem left {} unprocessed items (attempt {})",
                pending.len(),
                attempt + 1
            );
        }

        Err(WeatherError::store(format!(
            "{} items remained unprocessed after {} attempts",
            pending.len(),
            UNPROCESSED_RETRY_LIMIT + 1
        )))
    }

    async fn execute_query(&self, filter: &ReadingFilter) -> WeatherResult<Vec<Reading>> {
        let rendered = filter.to_partiql(&self.table_name);
        let parameters: Vec<AttributeValue> = rendered
            .parameters
            .iter()
            .map(|param| match param {
                PartiqlParam::Text(text) => AttributeValue::S(text.clone()),
                PartiqlParam::Number(number) => AttributeValue::N(number.to_string()),
            })
            .collect();

        debug!("Executing statement: {}", rendered.statement);

        let mut readings = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .execute_statement()
                .statement(rendered.statement.clone())
                .set_parameters(Some(parameters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    WeatherError::store(format!(
                        "ExecuteStatement on '{}' failed: {}",
                        self.table_name,
                        DisplayErrorContext(&e)
                    ))
                })?;

            for item in output.items() {
                readings.push(item_to_reading(item)?);
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(readings)
    }
}

#[async_trait]
impl ReadingStore for DynamoReadingStore {
    async fn put_reading(&self, reading: &Reading) -> WeatherResult<()> {
        trace!(
            "PutItem {}={} {}={}",
            attributes::DEVICE_ID,
            reading.device_id,
            attributes::TIMESTAMP,
            reading.timestamp
        );
        self.stats.write_calls.fetch_add(1, Ordering::Relaxed);

        let result = self
            .client
            .put_item()
            .table_name(self.table_name.clone())
            .set_item(Some(reading_to_item(reading)))
            .send()
            .await;

        match result {
            Ok(_) => {
                self.stats.readings_written.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.failed_writes.fetch_add(1, Ordering::Relaxed);
                Err(WeatherError::store(format!(
                    "PutItem on '{}' failed for ({}, {}): {}",
                    self.table_name,
                    reading.device_id,
                    reading.timestamp,
                    DisplayErrorContext(&e)
                )))
            }
        }
    }

    async fn put_readings(&self, readings: &[Reading]) -> WeatherResult<()> {
        if readings.is_empty() {
            return Ok(());
        }

        if readings.len() > DYNAMODB_BATCH_LIMIT {
            return Err(WeatherError::store(format!(
                "Batch of {} exceeds BatchWriteItem limit of {}",
                readings.len(),
                DYNAMODB_BATCH_LIMIT
            )));
        }

        self.stats.write_calls.fetch_add(1, Ordering::Relaxed);
        match self.write_batch(readings).await {
            Ok(()) => {
                self.stats
                    .readings_written
                    .fetch_add(readings.len() as u64, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.stats.failed_writes.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    fn max_batch_size(&self) -> usize {
        DYNAMODB_BATCH_LIMIT
    }

    async fn query_readings(&self, filter: &ReadingFilter) -> WeatherResult<Vec<Reading>> {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);

        let result = self.execute_query(filter).await;
        if result.is_err() {
            self.stats.failed_queries.fetch_add(1, Ordering::Relaxed);
        }
        result
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
        "dynamodb"
    }
}

/// Encode a reading as a DynamoDB item
pub fn reading_to_item(reading: &Reading) -> Item {
    HashMap::from([
        (
            attributes::DEVICE_ID.to_string(),
            AttributeValue::S(reading.device_id.as_str().to_string()),
        ),
        (
            attributes::TIMESTAMP.to_string(),
            AttributeValue::N(reading.timestamp.secs().to_string()),
        ),
        (
            attributes::TEMPERATURE.to_string(),
            AttributeValue::N(reading.temperature.to_string()),
        ),
        (
            attributes::HUMIDITY.to_string(),
            AttributeValue::N(reading.humidity.to_string()),
        ),
        (
            attributes::TEMPERATURE_TEXT.to_string(),
            AttributeValue::S(reading.temperature.to_string()),
        ),
        (
            attributes::HUMIDITY_TEXT.to_string(),
            AttributeValue::S(reading.humidity.to_string()),
        ),
    ])
}

/// Decode a DynamoDB item into a reading
pub fn item_to_reading(item: &Item) -> WeatherResult<Reading> {
    let device_id = item
        .get(attributes::DEVICE_ID)
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| missing_attribute(attributes::DEVICE_ID))?;

    let timestamp = number_attribute(item, attributes::TIMESTAMP)?
        .parse::<i64>()
        .map_err(|e| {
            WeatherError::store(format!(
                "Stored {} is not an integer: {}",
                attributes::TIMESTAMP,
                e
            ))
        })?;

    Ok(Reading::new(
        DeviceId::new(device_id.clone())?,
        Timestamp::from_secs(timestamp),
        decimal_attribute(item, attributes::TEMPERATURE, attributes::TEMPERATURE_TEXT)?,
        decimal_attribute(item, attributes::HUMIDITY, attributes::HUMIDITY_TEXT)?,
    ))
}

fn number_attribute<'a>(item: &'a Item, name: &str) -> WeatherResult<&'a String> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .ok_or_else(|| missing_attribute(name))
}

/// Prefer the exact text attribute; items written without it fall back to N
fn decimal_attribute(item: &Item, name: &str, text_name: &str) -> WeatherResult<Decimal> {
    match item.get(text_name).and_then(|v| v.as_s().ok()) {
        Some(text) => parse_decimal_str(text),
        None => parse_decimal_str(number_attribute(item, name)?),
    }
}

fn missing_attribute(name: &str) -> WeatherError {
    WeatherError::store(format!("Stored item is missing attribute '{}'", name))
}
